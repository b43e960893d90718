//! # Transport Module
//!
//! Byte-level links to the outside world, all behind one contract.
//!
//! This module handles:
//! - The [`Transport`] read/write contract shared by every link kind
//! - Opening links from an ordered candidate list ([`Connector`])
//! - Per-link connection state and self-healing re-acquisition ([`TransportHandle`])
//! - Serial devices, UDP sockets and Bluetooth RFCOMM ports
//! - Splitting line-oriented streams
//!
//! Transports know nothing about the bytes they carry.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::{RelayError, Result};

pub mod stream;
pub mod serial;
pub mod udp;
pub mod bluetooth;
pub mod lines;
pub mod supervised;

#[cfg(test)]
pub mod mocks;

/// One open link
#[async_trait]
pub trait Transport: Send {
    /// Logical name used in logs (e.g. "radio", "bluetooth")
    fn name(&self) -> &str;

    /// Read the next chunk into `buf`
    ///
    /// Blocks until data arrives or the read timeout expires.
    ///
    /// # Errors
    ///
    /// `LinkLost` on I/O failure, end of stream, or timeout. Check
    /// [`RelayError::is_timeout`] to tell a quiet link from a dead one.
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Deliver `data` best-effort
    ///
    /// # Errors
    ///
    /// `WriteFailed` if the link rejects the write.
    async fn write(&mut self, data: &[u8]) -> Result<()>;
}

/// Opens a [`Transport`] for a candidate device or endpoint
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open `candidate`
    ///
    /// # Errors
    ///
    /// `PortUnavailable` if the candidate cannot be opened.
    async fn open(&self, candidate: &str) -> Result<Box<dyn Transport>>;
}

/// Connection state of a [`TransportHandle`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No link open
    Disconnected,
    /// Trying candidates
    Connecting,
    /// Link open and producing data
    Connected,
    /// Link open but the last read timed out
    Degraded,
}

/// A worker's exclusive view of one link
///
/// Holds at most one open [`Transport`]. Any non-timeout failure drops the
/// link so the next [`acquire`](Self::acquire) starts over from the first
/// candidate.
pub struct TransportHandle {
    name: String,
    state: LinkState,
    endpoint: Option<String>,
    link: Option<Box<dyn Transport>>,
}

impl std::fmt::Debug for TransportHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportHandle")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl TransportHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: LinkState::Disconnected,
            endpoint: None,
            link: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Endpoint currently bound, or last attempted
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    pub fn is_open(&self) -> bool {
        self.link.is_some()
    }

    /// Open the first candidate that succeeds
    ///
    /// Candidates after the first success are not tried.
    ///
    /// # Errors
    ///
    /// `PortUnavailable` listing every candidate if none opened.
    pub async fn acquire(&mut self, connector: &dyn Connector, candidates: &[String]) -> Result<()> {
        self.state = LinkState::Connecting;

        for candidate in candidates {
            debug!("[{}] Trying {}", self.name, candidate);
            self.endpoint = Some(candidate.clone());

            match connector.open(candidate).await {
                Ok(link) => {
                    info!("[{}] Connected at {}", self.name, candidate);
                    self.link = Some(link);
                    self.state = LinkState::Connected;
                    return Ok(());
                }
                Err(e) => {
                    debug!("[{}] Failed to open {}: {}", self.name, candidate, e);
                }
            }
        }

        self.state = LinkState::Disconnected;
        Err(RelayError::PortUnavailable(candidates.join(", ")))
    }

    /// Read from the open link
    ///
    /// A timeout leaves the link open in `Degraded`; any other failure drops it.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let Some(link) = self.link.as_mut() else {
            return Err(RelayError::PortUnavailable(format!("{} not open", self.name)));
        };

        match link.read(buf).await {
            Ok(n) => {
                self.state = LinkState::Connected;
                Ok(n)
            }
            Err(e) if e.is_timeout() => {
                self.state = LinkState::Degraded;
                Err(e)
            }
            Err(e) => {
                warn!("[{}] {}", self.name, e);
                self.disconnect();
                Err(e)
            }
        }
    }

    /// Write to the open link, dropping it on failure
    pub async fn write(&mut self, data: &[u8]) -> Result<()> {
        let Some(link) = self.link.as_mut() else {
            return Err(RelayError::WriteFailed {
                link: self.name.clone(),
                reason: "not connected".to_string(),
            });
        };

        match link.write(data).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.disconnect();
                Err(e)
            }
        }
    }

    /// Close the link; the next cycle re-acquires
    pub fn disconnect(&mut self) {
        if self.link.take().is_some() {
            info!("[{}] Disconnected from {}", self.name, self.endpoint.as_deref().unwrap_or("?"));
        }
        self.state = LinkState::Disconnected;
    }
}
