//! Scripted in-memory transport for tests

use super::*;
use crate::error::LinkLossCause;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock transport
///
/// Reads are served from a queue; when it runs dry the mock behaves like a
/// quiet link and times out after a few milliseconds. Writes are captured.
#[derive(Clone)]
pub struct MockTransport {
    name: String,
    pub reads: Arc<Mutex<VecDeque<Result<Vec<u8>>>>>,
    pub written: Arc<Mutex<Vec<Vec<u8>>>>,
    pub write_error: Arc<Mutex<Option<String>>>,
    pub write_delay: Arc<Mutex<Option<Duration>>>,
}

impl MockTransport {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            reads: Arc::new(Mutex::new(VecDeque::new())),
            written: Arc::new(Mutex::new(Vec::new())),
            write_error: Arc::new(Mutex::new(None)),
            write_delay: Arc::new(Mutex::new(None)),
        }
    }

    pub fn push_read(&self, data: &[u8]) {
        self.reads.lock().unwrap().push_back(Ok(data.to_vec()));
    }

    pub fn push_error(&self, error: RelayError) {
        self.reads.lock().unwrap().push_back(Err(error));
    }

    pub fn get_written_data(&self) -> Vec<Vec<u8>> {
        self.written.lock().unwrap().clone()
    }

    pub fn set_write_error(&self, reason: &str) {
        *self.write_error.lock().unwrap() = Some(reason.to_string());
    }

    pub fn set_write_delay(&self, delay: Duration) {
        *self.write_delay.lock().unwrap() = Some(delay);
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let next = self.reads.lock().unwrap().pop_front();
        match next {
            Some(Ok(data)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                Ok(n)
            }
            Some(Err(e)) => Err(e),
            None => {
                let idle = Duration::from_millis(5);
                tokio::time::sleep(idle).await;
                Err(RelayError::LinkLost {
                    link: self.name.clone(),
                    cause: LinkLossCause::Timeout(idle),
                })
            }
        }
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        let delay = *self.write_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let error = self.write_error.lock().unwrap().clone();
        if let Some(reason) = error {
            return Err(RelayError::WriteFailed {
                link: self.name.clone(),
                reason,
            });
        }
        self.written.lock().unwrap().push(data.to_vec());
        Ok(())
    }
}

/// Connector that opens clones of one [`MockTransport`] once `available`
#[derive(Clone)]
pub struct MockPortConnector {
    pub transport: MockTransport,
    pub available: Arc<Mutex<Vec<String>>>,
    pub attempts: Arc<Mutex<Vec<String>>>,
}

impl MockPortConnector {
    pub fn new(transport: MockTransport) -> Self {
        Self {
            transport,
            available: Arc::new(Mutex::new(Vec::new())),
            attempts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Make `candidate` openable from now on
    pub fn plug_in(&self, candidate: &str) {
        self.available.lock().unwrap().push(candidate.to_string());
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }

    /// Every candidate tried so far, in order
    pub fn attempted(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for MockPortConnector {
    async fn open(&self, candidate: &str) -> Result<Box<dyn Transport>> {
        self.attempts.lock().unwrap().push(candidate.to_string());
        if self.available.lock().unwrap().iter().any(|c| c == candidate) {
            Ok(Box::new(self.transport.clone()))
        } else {
            Err(RelayError::PortUnavailable(candidate.to_string()))
        }
    }
}
