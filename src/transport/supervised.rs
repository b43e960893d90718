//! Self-healing link used by every long-running reader

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::Result;
use super::serial::candidate_ports;
use super::{Connector, LinkState, TransportHandle};

/// Log every Nth consecutive failed round at warn level
const WARN_EVERY_ROUNDS: u64 = 50;

/// Where a worker looks for its device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortSource {
    /// Platform candidate list, recomputed every round
    Detect,
    /// Fixed list from configuration, tried in order
    Fixed(Vec<String>),
}

impl PortSource {
    /// `Detect` for an empty list, `Fixed` otherwise
    pub fn from_list(ports: &[String]) -> Self {
        if ports.is_empty() {
            PortSource::Detect
        } else {
            PortSource::Fixed(ports.to_vec())
        }
    }

    pub fn candidates(&self) -> Vec<String> {
        match self {
            PortSource::Detect => candidate_ports(),
            PortSource::Fixed(ports) => ports.clone(),
        }
    }
}

/// Result of [`SupervisedLink::ensure_open`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquire {
    /// A link was already open
    Open,
    /// A link was opened this round
    Reconnected,
    /// No candidate opened; the retry delay has been waited out
    Unavailable,
}

/// A [`TransportHandle`] plus the policy for re-acquiring it
///
/// Each round with no open link walks the whole candidate list; if nothing
/// opens, the link waits a fixed delay before the next round.
pub struct SupervisedLink {
    handle: TransportHandle,
    connector: Arc<dyn Connector>,
    ports: PortSource,
    retry_delay: Duration,
    failed_rounds: u64,
    reconnects: u64,
}

impl SupervisedLink {
    pub fn new(
        name: impl Into<String>,
        connector: Arc<dyn Connector>,
        ports: PortSource,
        retry_delay: Duration,
    ) -> Self {
        Self {
            handle: TransportHandle::new(name),
            connector,
            ports,
            retry_delay,
            failed_rounds: 0,
            reconnects: 0,
        }
    }

    pub fn name(&self) -> &str {
        self.handle.name()
    }

    pub fn state(&self) -> LinkState {
        self.handle.state()
    }

    /// Times a link has been opened
    pub fn reconnects(&self) -> u64 {
        self.reconnects
    }

    /// Make sure a link is open, trying one full round of candidates if not
    pub async fn ensure_open(&mut self) -> Acquire {
        if self.handle.is_open() {
            return Acquire::Open;
        }

        let candidates = self.ports.candidates();
        match self.handle.acquire(self.connector.as_ref(), &candidates).await {
            Ok(()) => {
                if self.failed_rounds > 0 {
                    info!(
                        "[{}] Link restored after {} failed rounds",
                        self.handle.name(),
                        self.failed_rounds
                    );
                }
                self.failed_rounds = 0;
                self.reconnects += 1;
                Acquire::Reconnected
            }
            Err(e) => {
                self.failed_rounds += 1;
                if self.failed_rounds == 1 || self.failed_rounds % WARN_EVERY_ROUNDS == 0 {
                    warn!(
                        "[{}] No device available (round {}): {}",
                        self.handle.name(),
                        self.failed_rounds,
                        e
                    );
                }
                sleep(self.retry_delay).await;
                Acquire::Unavailable
            }
        }
    }

    /// Read from the open link; see [`TransportHandle::read`]
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.handle.read(buf).await
    }
}
