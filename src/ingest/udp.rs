//! # UDP Telemetry Worker
//!
//! Receives telemetry datagrams on the bound groundstation port and applies
//! whatever the decoder extracts. The socket is bound once by the
//! coordinator; the worker itself never fails.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{trace, warn};

use super::datagram::DatagramDecoder;
use super::{IngestStats, IngestWorker};
use crate::telemetry::TelemetryStore;
use crate::transport::udp::UdpTransport;
use crate::transport::Transport;

/// Pause after a socket error so a persistent fault cannot spin
const ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Worker owning the UDP listener
pub struct UdpWorker {
    link: UdpTransport,
    decoder: Box<dyn DatagramDecoder>,
    buffer: Vec<u8>,
    store: Arc<TelemetryStore>,
    stats: Arc<IngestStats>,
}

impl UdpWorker {
    pub fn new(
        link: UdpTransport,
        decoder: Box<dyn DatagramDecoder>,
        buffer_size: usize,
        store: Arc<TelemetryStore>,
        stats: Arc<IngestStats>,
    ) -> Self {
        Self {
            link,
            decoder,
            buffer: vec![0u8; buffer_size],
            store,
            stats,
        }
    }

    /// Receive and apply at most one datagram
    pub async fn poll(&mut self) {
        match self.link.read(&mut self.buffer).await {
            Ok(n) => {
                self.stats.udp_datagrams.fetch_add(1, Ordering::Relaxed);
                let updates = self.decoder.decode(&self.buffer[..n]);
                trace!("[{}] {} bytes -> {} updates", self.link.name(), n, updates.len());
                self.stats
                    .udp_updates
                    .fetch_add(updates.len() as u64, Ordering::Relaxed);
                self.store.apply_all(updates);
            }
            Err(e) if e.is_timeout() => {}
            Err(e) => {
                self.stats.udp_errors.fetch_add(1, Ordering::Relaxed);
                warn!("[{}] {}", self.link.name(), e);
                tokio::time::sleep(ERROR_BACKOFF).await;
            }
        }
    }
}

#[async_trait]
impl IngestWorker for UdpWorker {
    async fn poll(&mut self) {
        UdpWorker::poll(self).await
    }
}
