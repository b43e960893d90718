//! # Fan-out Relay Module
//!
//! Airside: every line from the flight controller goes to every outbound
//! link at once.
//!
//! This module handles:
//! - Lazily opening each outbound link and re-opening it after a failure
//! - Writing one line to all links concurrently, each under its own timeout
//! - Counting deliveries and failures per link
//!
//! A failing link never holds up the others and never surfaces as an error
//! to the caller. Each dispatch completes before the next line is taken, so
//! every link sees lines in the order they were read.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{RelayError, Result};
use crate::transport::{Connector, TransportHandle};

pub mod airside;

/// Delivery counters for one outbound link
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkStats {
    pub delivered: u64,
    pub failed: u64,
    pub connects: u64,
    /// Failures since the last successful write
    pub consecutive_failures: u64,
}

/// One outbound link that reconnects on demand
pub struct OutboundSink {
    handle: TransportHandle,
    connector: Arc<dyn Connector>,
    endpoint: Vec<String>,
    stats: SinkStats,
}

impl OutboundSink {
    /// # Arguments
    ///
    /// * `name` - Link name for logs (e.g. "wifi")
    /// * `connector` - Opens the link
    /// * `endpoint` - Device path or `host:port` handed to the connector
    pub fn new(name: impl Into<String>, connector: Arc<dyn Connector>, endpoint: impl Into<String>) -> Self {
        Self {
            handle: TransportHandle::new(name),
            connector,
            endpoint: vec![endpoint.into()],
            stats: SinkStats::default(),
        }
    }

    pub fn name(&self) -> &str {
        self.handle.name()
    }

    pub fn stats(&self) -> SinkStats {
        self.stats
    }

    /// Open the link if needed, then write `data`
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        if !self.handle.is_open() {
            self.handle.acquire(self.connector.as_ref(), &self.endpoint).await?;
            self.stats.connects += 1;
        }
        self.handle.write(data).await
    }

    /// Send under `limit`; a write that overruns it drops the link
    async fn deliver(&mut self, data: &[u8], limit: Duration) -> bool {
        let outcome = match timeout(limit, self.send(data)).await {
            Ok(result) => result,
            Err(_) => {
                self.handle.disconnect();
                Err(RelayError::WriteFailed {
                    link: self.name().to_string(),
                    reason: format!("timed out after {:?}", limit),
                })
            }
        };

        match outcome {
            Ok(()) => {
                if self.stats.consecutive_failures > 0 {
                    info!(
                        "[{}] Delivering again after {} failed writes",
                        self.name(),
                        self.stats.consecutive_failures
                    );
                }
                self.stats.delivered += 1;
                self.stats.consecutive_failures = 0;
                true
            }
            Err(e) => {
                // Only the first failure of a streak is worth a warning
                if self.stats.consecutive_failures == 0 {
                    warn!("[{}] {}", self.name(), e);
                } else {
                    debug!("[{}] {}", self.name(), e);
                }
                self.stats.failed += 1;
                self.stats.consecutive_failures += 1;
                false
            }
        }
    }
}

/// Outcome of one [`FanOutRelay::dispatch`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: Vec<String>,
    pub failed: Vec<String>,
}

/// Broadcasts lines to every outbound link
pub struct FanOutRelay {
    sinks: Vec<OutboundSink>,
    write_timeout: Duration,
}

impl FanOutRelay {
    pub fn new(sinks: Vec<OutboundSink>, write_timeout: Duration) -> Self {
        Self {
            sinks,
            write_timeout,
        }
    }

    pub fn sink_names(&self) -> Vec<&str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    /// Write `line` to every link concurrently
    ///
    /// Returns once every link has either delivered, failed, or timed out.
    pub async fn dispatch(&mut self, line: &[u8]) -> DispatchReport {
        let limit = self.write_timeout;
        let outcomes = join_all(
            self.sinks
                .iter_mut()
                .map(|sink| async move { (sink.deliver(line, limit).await, sink.name().to_string()) }),
        )
        .await;

        let mut report = DispatchReport::default();
        for (ok, name) in outcomes {
            if ok {
                report.delivered.push(name);
            } else {
                report.failed.push(name);
            }
        }
        report
    }

    /// Per-link counters, in configuration order
    pub fn stats(&self) -> Vec<(String, SinkStats)> {
        self.sinks
            .iter()
            .map(|s| (s.name().to_string(), s.stats()))
            .collect()
    }

    pub fn log_stats(&self) {
        for (name, stats) in self.stats() {
            info!(
                "[{}] {} delivered, {} failed, {} connects",
                name, stats.delivered, stats.failed, stats.connects
            );
        }
    }
}
