//! # Airside Relay
//!
//! Reads the flight controller's serial output line by line and hands each
//! line to the [`FanOutRelay`].
//!
//! Lines are forwarded as received, terminator included. A line still
//! unterminated when the link goes quiet is forwarded as-is.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

use super::{FanOutRelay, OutboundSink};
use crate::config::Config;
use crate::transport::bluetooth::{is_valid_address, BluetoothConnector};
use crate::transport::lines::LineSplitter;
use crate::transport::serial::SerialConnector;
use crate::transport::supervised::{Acquire, PortSource, SupervisedLink};
use crate::transport::udp::UdpConnector;

const READ_CHUNK_SIZE: usize = 512;

/// Interval between per-link statistics log lines
pub const STATS_LOG_INTERVAL: Duration = Duration::from_secs(30);

/// Build the outbound links enabled in `config`
pub fn outbound_sinks(config: &Config) -> Vec<OutboundSink> {
    let outbound = &config.outbound;
    let timeout = config.ingest.read_timeout();
    let mut sinks = Vec::new();

    if outbound.udp_enabled {
        sinks.push(OutboundSink::new(
            "wifi",
            Arc::new(UdpConnector::new("wifi", timeout)),
            format!("{}:{}", outbound.udp_host, outbound.udp_port),
        ));
    }

    if outbound.bluetooth_enabled {
        if !is_valid_address(&outbound.bluetooth_address) {
            warn!("Bluetooth address {:?} looks malformed", outbound.bluetooth_address);
        }
        sinks.push(OutboundSink::new(
            "bluetooth",
            Arc::new(BluetoothConnector::new(
                outbound.bluetooth_address.clone(),
                outbound.bluetooth_channel,
                timeout,
            )),
            outbound.bluetooth_device.clone(),
        ));
    }

    if outbound.radio_enabled {
        sinks.push(OutboundSink::new(
            "radio",
            Arc::new(SerialConnector::new("radio", outbound.radio_baud_rate, timeout)),
            outbound.radio_port.clone(),
        ));
    }

    sinks
}

/// Flight-controller reader feeding the fan-out relay
pub struct AirsideRelay {
    fc: SupervisedLink,
    lines: LineSplitter,
    relay: FanOutRelay,
    forwarded: u64,
    stats_interval: Duration,
    last_stats: Instant,
}

impl AirsideRelay {
    pub fn new(fc: SupervisedLink, relay: FanOutRelay) -> Self {
        Self {
            fc,
            lines: LineSplitter::new(),
            relay,
            forwarded: 0,
            stats_interval: STATS_LOG_INTERVAL,
            last_stats: Instant::now(),
        }
    }

    /// Relay reading the configured flight-controller port
    pub fn from_config(config: &Config) -> Self {
        let connector = SerialConnector::new(
            "fc",
            config.airside.fc_baud_rate,
            config.ingest.read_timeout(),
        );
        let fc = SupervisedLink::new(
            "fc",
            Arc::new(connector),
            PortSource::Fixed(vec![config.airside.fc_port.clone()]),
            config.ingest.retry_delay(),
        );
        let relay = FanOutRelay::new(outbound_sinks(config), config.outbound.write_timeout());

        info!(
            "Relaying {} -> [{}]",
            config.airside.fc_port,
            relay.sink_names().join(", ")
        );
        Self::new(fc, relay)
    }

    /// Lines forwarded so far
    pub fn forwarded(&self) -> u64 {
        self.forwarded
    }

    pub fn relay(&self) -> &FanOutRelay {
        &self.relay
    }

    /// Run forever
    pub async fn run(mut self) {
        loop {
            self.poll().await;
        }
    }

    /// One cycle: (re)acquire the flight controller if needed, read once,
    /// forward every complete line
    pub async fn poll(&mut self) {
        match self.fc.ensure_open().await {
            Acquire::Unavailable => return,
            Acquire::Reconnected => self.lines.clear(),
            Acquire::Open => {}
        }

        let mut buf = [0u8; READ_CHUNK_SIZE];
        match self.fc.read(&mut buf).await {
            Ok(n) => {
                for line in self.lines.push(&buf[..n]) {
                    self.forward(&line).await;
                }
            }
            Err(e) if e.is_timeout() => {
                if let Some(partial) = self.lines.take_partial() {
                    self.forward(&partial).await;
                }
            }
            Err(_) => self.lines.clear(),
        }

        if self.last_stats.elapsed() >= self.stats_interval {
            info!("Forwarded {} lines", self.forwarded);
            self.relay.log_stats();
            self.last_stats = Instant::now();
        }
    }

    async fn forward(&mut self, line: &[u8]) {
        self.relay.dispatch(line).await;
        self.forwarded += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mocks::{MockPortConnector, MockTransport};

    fn relay_with(
        fc_link: &MockTransport,
        outbound: &[&MockTransport],
    ) -> AirsideRelay {
        let fc = MockPortConnector::new(fc_link.clone());
        fc.plug_in("/dev/ttyAMA0");
        let fc = SupervisedLink::new(
            "fc",
            Arc::new(fc),
            PortSource::Fixed(vec!["/dev/ttyAMA0".into()]),
            Duration::from_millis(5),
        );

        let sinks = outbound
            .iter()
            .map(|link| {
                let connector = MockPortConnector::new((*link).clone());
                connector.plug_in("endpoint");
                OutboundSink::new("sink", Arc::new(connector), "endpoint")
            })
            .collect();

        AirsideRelay::new(fc, FanOutRelay::new(sinks, Duration::from_millis(200)))
    }

    #[tokio::test]
    async fn test_lines_forwarded_to_every_link() {
        let fc = MockTransport::new("fc");
        fc.push_read(b"ALT:120\nSPD:");
        fc.push_read(b"45\n");
        let wifi = MockTransport::new("wifi");
        let radio = MockTransport::new("radio");

        let mut airside = relay_with(&fc, &[&wifi, &radio]);
        airside.poll().await;
        airside.poll().await;

        let expected = vec![b"ALT:120\n".to_vec(), b"SPD:45\n".to_vec()];
        assert_eq!(wifi.get_written_data(), expected);
        assert_eq!(radio.get_written_data(), expected);
        assert_eq!(airside.forwarded(), 2);
    }

    #[tokio::test]
    async fn test_partial_line_flushed_when_quiet() {
        let fc = MockTransport::new("fc");
        fc.push_read(b"HDG:270");
        let wifi = MockTransport::new("wifi");

        let mut airside = relay_with(&fc, &[&wifi]);
        airside.poll().await;
        assert!(wifi.get_written_data().is_empty());

        airside.poll().await;
        assert_eq!(wifi.get_written_data(), vec![b"HDG:270".to_vec()]);
    }

    #[tokio::test]
    async fn test_failing_link_does_not_stop_forwarding() {
        let fc = MockTransport::new("fc");
        fc.push_read(b"a\nb\n");
        let wifi = MockTransport::new("wifi");
        let bluetooth = MockTransport::new("bluetooth");
        let radio = MockTransport::new("radio");
        bluetooth.set_write_error("host is down");

        let mut airside = relay_with(&fc, &[&wifi, &bluetooth, &radio]);
        airside.poll().await;

        assert_eq!(wifi.get_written_data().len(), 2);
        assert_eq!(radio.get_written_data().len(), 2);
        let stats = airside.relay().stats();
        assert_eq!(stats[1].1.failed, 2);
    }

    #[test]
    fn test_outbound_sinks_follow_config() {
        let mut config = Config::default();
        assert_eq!(
            FanOutRelay::new(outbound_sinks(&config), Duration::from_secs(1)).sink_names(),
            vec!["wifi", "bluetooth", "radio"]
        );

        config.outbound.bluetooth_enabled = false;
        config.outbound.radio_enabled = false;
        assert_eq!(
            FanOutRelay::new(outbound_sinks(&config), Duration::from_secs(1)).sink_names(),
            vec!["wifi"]
        );
    }
}
