//! # Serial Transport
//!
//! Serial devices: flight-controller UART, long-range radio module, RC
//! transmitter passthrough.
//!
//! This module handles:
//! - Opening a device at a configured baud rate (8N1, no flow control)
//! - Platform-specific candidate device lists
//! - Wrapping the port in the common [`Transport`] contract

use std::time::Duration;

use async_trait::async_trait;
use tokio_serial::SerialPortBuilderExt;
use tracing::debug;

use super::stream::StreamTransport;
use super::{Connector, Transport};
use crate::error::{RelayError, Result};

/// Default candidate devices on Linux (in order of preference)
const UNIX_DEVICE_PATHS: &[&str] = &[
    "/dev/ttyACM0", // USB CDC devices
    "/dev/ttyAMA0", // Raspberry Pi primary UART
    "/dev/ttyUSB0", // USB-to-serial adapters
    "/dev/serial0", // Raspberry Pi alias
];

/// Highest COM port number probed on Windows
const MAX_COM_PORT: u32 = 19;

/// Candidate serial devices for this platform
///
/// Recomputed on every call; nothing about previous successes is kept.
///
/// # Examples
///
/// ```
/// use telemetry_relay::transport::serial::candidate_ports;
///
/// let ports = candidate_ports();
/// assert!(!ports.is_empty());
/// ```
pub fn candidate_ports() -> Vec<String> {
    if cfg!(windows) {
        (1..=MAX_COM_PORT).map(|i| format!("COM{}", i)).collect()
    } else {
        UNIX_DEVICE_PATHS.iter().map(|p| p.to_string()).collect()
    }
}

/// Opens serial devices as [`Transport`]s
#[derive(Debug, Clone)]
pub struct SerialConnector {
    name: String,
    baud_rate: u32,
    read_timeout: Duration,
}

impl SerialConnector {
    /// # Arguments
    ///
    /// * `name` - Logical link name for logs (e.g. "radio")
    /// * `baud_rate` - Line speed
    /// * `read_timeout` - How long a read may block before reporting a timeout
    pub fn new(name: impl Into<String>, baud_rate: u32, read_timeout: Duration) -> Self {
        Self {
            name: name.into(),
            baud_rate,
            read_timeout,
        }
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }
}

/// Open a specific serial port with 8N1 settings
pub(crate) fn open_port(path: &str, baud_rate: u32) -> Result<tokio_serial::SerialStream> {
    let port = tokio_serial::new(path, baud_rate)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .flow_control(tokio_serial::FlowControl::None)
        .open_native_async()
        .map_err(|e| RelayError::PortUnavailable(format!("Failed to open {}: {}", path, e)))?;

    Ok(port)
}

#[async_trait]
impl Connector for SerialConnector {
    async fn open(&self, candidate: &str) -> Result<Box<dyn Transport>> {
        debug!("[{}] Opening serial port {} at {} baud", self.name, candidate, self.baud_rate);
        let port = open_port(candidate, self.baud_rate)?;
        Ok(Box::new(StreamTransport::new(
            self.name.clone(),
            port,
            self.read_timeout,
        )))
    }
}
