//! # UDP Transport
//!
//! WiFi links: a bound listener on the groundstation and a datagram sender
//! on the airside. Each datagram is one read or one write.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::{debug, info};

use super::{Connector, Transport};
use crate::error::{LinkLossCause, RelayError, Result};

/// [`Transport`] over a UDP socket
///
/// Reads accept datagrams from any peer and remember the sender; writes go
/// to the configured peer, or to the last sender if none was configured.
pub struct UdpTransport {
    name: String,
    socket: UdpSocket,
    peer: Option<SocketAddr>,
    read_timeout: Duration,
    packets_received: u64,
}

impl std::fmt::Debug for UdpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpTransport")
            .field("name", &self.name)
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}

impl UdpTransport {
    /// Bind a listening socket on all interfaces
    ///
    /// # Errors
    ///
    /// `Bind` if the port cannot be acquired. Callers treat this as fatal.
    pub async fn bind(name: impl Into<String>, port: u16, read_timeout: Duration) -> Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", port))
            .await
            .map_err(|source| RelayError::Bind { port, source })?;

        let name = name.into();
        info!(
            "[{}] Listening on {}",
            name,
            socket
                .local_addr()
                .map(|a| a.to_string())
                .unwrap_or_else(|_| format!("0.0.0.0:{}", port))
        );

        Ok(Self {
            name,
            socket,
            peer: None,
            read_timeout,
            packets_received: 0,
        })
    }

    /// Socket sending to `peer` from an ephemeral local port
    pub async fn connect(name: impl Into<String>, peer: SocketAddr, read_timeout: Duration) -> Result<Self> {
        let local: SocketAddr = if peer.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };
        let socket = UdpSocket::bind(local).await.map_err(|e| {
            RelayError::PortUnavailable(format!("Failed to open UDP socket for {}: {}", peer, e))
        })?;

        Ok(Self {
            name: name.into(),
            socket,
            peer: Some(peer),
            read_timeout,
            packets_received: 0,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn packets_received(&self) -> u64 {
        self.packets_received
    }
}

#[async_trait]
impl Transport for UdpTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match timeout(self.read_timeout, self.socket.recv_from(buf)).await {
            Err(_) => Err(RelayError::LinkLost {
                link: self.name.clone(),
                cause: LinkLossCause::Timeout(self.read_timeout),
            }),
            Ok(Ok((len, from))) => {
                self.packets_received += 1;
                if self.packets_received == 1 {
                    info!("[{}] First datagram from {} ({} bytes)", self.name, from, len);
                }
                if self.peer != Some(from) {
                    debug!("[{}] Peer is now {}", self.name, from);
                }
                self.peer = Some(from);
                Ok(len)
            }
            Ok(Err(e)) => Err(RelayError::link_io(&self.name, e)),
        }
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        let Some(peer) = self.peer else {
            return Err(RelayError::WriteFailed {
                link: self.name.clone(),
                reason: "no peer address known".to_string(),
            });
        };

        self.socket
            .send_to(data, peer)
            .await
            .map_err(|e| RelayError::WriteFailed {
                link: self.name.clone(),
                reason: format!("send to {} failed: {}", peer, e),
            })?;
        Ok(())
    }
}

/// Opens datagram senders; candidates are `host:port` strings
#[derive(Debug, Clone)]
pub struct UdpConnector {
    name: String,
    read_timeout: Duration,
}

impl UdpConnector {
    pub fn new(name: impl Into<String>, read_timeout: Duration) -> Self {
        Self {
            name: name.into(),
            read_timeout,
        }
    }
}

#[async_trait]
impl Connector for UdpConnector {
    async fn open(&self, candidate: &str) -> Result<Box<dyn Transport>> {
        let peer = tokio::net::lookup_host(candidate)
            .await
            .map_err(|e| RelayError::PortUnavailable(format!("Cannot resolve {}: {}", candidate, e)))?
            .next()
            .ok_or_else(|| RelayError::PortUnavailable(format!("No address for {}", candidate)))?;

        let link = UdpTransport::connect(self.name.clone(), peer, self.read_timeout).await?;
        Ok(Box::new(link))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_datagram_round_trip() {
        let mut listener = UdpTransport::bind("udp", 0, Duration::from_secs(1)).await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let connector = UdpConnector::new("wifi", Duration::from_secs(1));
        let mut sender = connector.open(&format!("127.0.0.1:{}", port)).await.unwrap();
        sender.write(b"telemetry line\n").await.unwrap();

        let mut buf = [0u8; 64];
        let n = listener.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"telemetry line\n");
        assert_eq!(listener.packets_received(), 1);
    }

    #[tokio::test]
    async fn test_listener_timeout_is_not_fatal() {
        let mut listener = UdpTransport::bind("udp", 0, Duration::from_millis(20)).await.unwrap();

        let mut buf = [0u8; 64];
        assert!(listener.read(&mut buf).await.unwrap_err().is_timeout());
        assert!(listener.read(&mut buf).await.unwrap_err().is_timeout());
    }

    #[tokio::test]
    async fn test_bind_conflict_is_bind_error() {
        let first = UdpTransport::bind("udp", 0, Duration::from_secs(1)).await.unwrap();
        let port = first.local_addr().unwrap().port();

        match UdpTransport::bind("udp", port, Duration::from_secs(1)).await {
            Err(RelayError::Bind { port: p, .. }) => assert_eq!(p, port),
            other => panic!("Expected Bind error, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_write_without_peer_fails() {
        let mut listener = UdpTransport::bind("udp", 0, Duration::from_secs(1)).await.unwrap();
        let err = listener.write(b"x").await.unwrap_err();
        assert!(matches!(err, RelayError::WriteFailed { .. }));
    }

    #[tokio::test]
    async fn test_unresolvable_host() {
        let connector = UdpConnector::new("wifi", Duration::from_secs(1));
        let result = connector.open("not a host").await;
        assert!(matches!(result, Err(RelayError::PortUnavailable(_))));
    }
}
