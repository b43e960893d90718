//! Byte-stream adapter shared by serial and Bluetooth links

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tracing::trace;

use super::Transport;
use crate::error::{LinkLossCause, RelayError, Result};

/// Default read timeout for every link
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// [`Transport`] over any async byte stream
pub struct StreamTransport<S> {
    name: String,
    stream: S,
    read_timeout: Duration,
}

impl<S> StreamTransport<S> {
    pub fn new(name: impl Into<String>, stream: S, read_timeout: Duration) -> Self {
        Self {
            name: name.into(),
            stream,
            read_timeout,
        }
    }
}

#[async_trait]
impl<S> Transport for StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match timeout(self.read_timeout, self.stream.read(buf)).await {
            Err(_) => Err(RelayError::LinkLost {
                link: self.name.clone(),
                cause: LinkLossCause::Timeout(self.read_timeout),
            }),
            Ok(Ok(0)) if !buf.is_empty() => Err(RelayError::LinkLost {
                link: self.name.clone(),
                cause: LinkLossCause::Closed,
            }),
            Ok(Ok(n)) => {
                trace!("[{}] Read {} bytes", self.name, n);
                Ok(n)
            }
            Ok(Err(e)) => Err(RelayError::link_io(&self.name, e)),
        }
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        self.stream
            .write_all(data)
            .await
            .map_err(|e| RelayError::WriteFailed {
                link: self.name.clone(),
                reason: format!("Failed to write packet: {}", e),
            })?;

        self.stream
            .flush()
            .await
            .map_err(|e| RelayError::WriteFailed {
                link: self.name.clone(),
                reason: format!("Failed to flush: {}", e),
            })?;

        trace!("[{}] Sent {} bytes", self.name, data.len());
        Ok(())
    }
}
