//! # Bluetooth Transport
//!
//! Bluetooth RFCOMM links to a paired groundstation.
//!
//! The paired address is bound to an RFCOMM TTY by the system
//! (`rfcomm bind /dev/rfcomm0 <address> <channel>`); opening that device
//! establishes the connection. The device is then driven like any other
//! serial port.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::serial::open_port;
use super::stream::StreamTransport;
use super::{Connector, Transport};
use crate::error::{RelayError, Result};

/// RFCOMM TTYs ignore line speed; any valid value works
const RFCOMM_BAUD_RATE: u32 = 115_200;

/// Opens RFCOMM TTY devices bound to a paired address
#[derive(Debug, Clone)]
pub struct BluetoothConnector {
    address: String,
    channel: u8,
    read_timeout: Duration,
}

impl BluetoothConnector {
    pub fn new(address: impl Into<String>, channel: u8, read_timeout: Duration) -> Self {
        Self {
            address: address.into(),
            channel,
            read_timeout,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

/// Check a `XX:XX:XX:XX:XX:XX` Bluetooth device address
pub fn is_valid_address(address: &str) -> bool {
    let parts: Vec<&str> = address.split(':').collect();
    parts.len() == 6
        && parts
            .iter()
            .all(|p| p.len() == 2 && p.chars().all(|c| c.is_ascii_hexdigit()))
}

#[async_trait]
impl Connector for BluetoothConnector {
    async fn open(&self, candidate: &str) -> Result<Box<dyn Transport>> {
        debug!(
            "[bluetooth] Opening {} for {} channel {}",
            candidate, self.address, self.channel
        );
        let port = open_port(candidate, RFCOMM_BAUD_RATE).map_err(|e| {
            RelayError::PortUnavailable(format!("{} ({} ch {})", e, self.address, self.channel))
        })?;
        Ok(Box::new(StreamTransport::new(
            "bluetooth",
            port,
            self.read_timeout,
        )))
    }
}
