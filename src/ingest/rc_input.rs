//! # RC Input Worker
//!
//! Reads the RC transmitter's ASCII passthrough, one line per update.
//!
//! Channel lines look like `CH1:1500,CH2:1200,CH3:1000`. Each one replaces
//! the whole channel map. Lines without `CH` are other chatter and are
//! skipped; channel lines that fail to parse are dropped with a warning.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{trace, warn};

use super::{IngestStats, IngestWorker};
use crate::telemetry::{FieldUpdate, RcChannelMap, TelemetryStore};
use crate::transport::lines::LineSplitter;
use crate::transport::supervised::{Acquire, SupervisedLink};

const READ_CHUNK_SIZE: usize = 256;

/// Parse a `key:value,key:value` channel line
///
/// Returns `None` for lines that do not mention `CH`, lines with no
/// `key:value` pair, and lines where any value is not an integer.
///
/// # Examples
///
/// ```
/// use telemetry_relay::ingest::rc_input::parse_rc_line;
///
/// let channels = parse_rc_line("CH1:1500,CH2:1200").unwrap();
/// assert_eq!(channels["CH1"], 1500);
/// assert_eq!(channels["CH2"], 1200);
///
/// assert!(parse_rc_line("garbage").is_none());
/// ```
pub fn parse_rc_line(line: &str) -> Option<RcChannelMap> {
    if !line.contains("CH") {
        return None;
    }

    let mut channels = RcChannelMap::new();
    for part in line.trim().split(',') {
        let Some((key, value)) = part.split_once(':') else {
            continue;
        };
        let value = value.trim().parse::<i32>().ok()?;
        channels.insert(key.trim().to_string(), value);
    }

    if channels.is_empty() {
        None
    } else {
        Some(channels)
    }
}

/// Worker owning the RC input link
pub struct RcInputWorker {
    link: SupervisedLink,
    lines: LineSplitter,
    store: Arc<TelemetryStore>,
    stats: Arc<IngestStats>,
}

impl RcInputWorker {
    pub fn new(link: SupervisedLink, store: Arc<TelemetryStore>, stats: Arc<IngestStats>) -> Self {
        Self {
            link,
            lines: LineSplitter::new(),
            store,
            stats,
        }
    }

    /// One cycle: (re)acquire if needed, then one read
    pub async fn poll(&mut self) {
        match self.link.ensure_open().await {
            Acquire::Unavailable => return,
            Acquire::Reconnected => {
                self.stats.reconnects.fetch_add(1, Ordering::Relaxed);
                self.lines.clear();
            }
            Acquire::Open => {}
        }

        let mut buf = [0u8; READ_CHUNK_SIZE];
        match self.link.read(&mut buf).await {
            Ok(n) => {
                for line in self.lines.push(&buf[..n]) {
                    self.handle_line(&line);
                }
            }
            Err(e) if e.is_timeout() => {
                // A quiet link ends whatever line was in flight
                if let Some(partial) = self.lines.take_partial() {
                    self.handle_line(&partial);
                }
            }
            Err(_) => self.lines.clear(),
        }
    }

    fn handle_line(&self, raw: &[u8]) {
        let Ok(line) = std::str::from_utf8(raw) else {
            warn!("[{}] Discarding non-UTF-8 line ({} bytes)", self.link.name(), raw.len());
            self.stats.rc_rejected.fetch_add(1, Ordering::Relaxed);
            return;
        };
        let line = line.trim();

        if !line.contains("CH") {
            trace!("[{}] Ignoring line: {:?}", self.link.name(), line);
            return;
        }

        match parse_rc_line(line) {
            Some(channels) => {
                self.stats.rc_lines.fetch_add(1, Ordering::Relaxed);
                self.store.apply(FieldUpdate::RcChannels(channels));
            }
            None => {
                warn!("[{}] Discarding malformed channel line: {:?}", self.link.name(), line);
                self.stats.rc_rejected.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

#[async_trait]
impl IngestWorker for RcInputWorker {
    async fn poll(&mut self) {
        RcInputWorker::poll(self).await
    }

    fn reset(&mut self) {
        self.lines.clear();
    }
}
