//! # Long-Range Radio Worker
//!
//! Reads the radio module's binary stream, frames it, and applies every
//! decoded record to the store.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{IngestStats, IngestWorker};
use crate::radio::framer::Framer;
use crate::radio::protocol::DecodedRecord;
use crate::telemetry::{FieldUpdate, TelemetryStore};
use crate::transport::supervised::{Acquire, SupervisedLink};

const READ_CHUNK_SIZE: usize = 256;

impl From<DecodedRecord> for FieldUpdate {
    fn from(record: DecodedRecord) -> Self {
        match record {
            DecodedRecord::Gps(fix) => FieldUpdate::Gps {
                latitude: fix.latitude,
                longitude: fix.longitude,
            },
        }
    }
}

/// Worker owning the radio link and its framer
pub struct RadioWorker {
    link: SupervisedLink,
    framer: Framer,
    store: Arc<TelemetryStore>,
    stats: Arc<IngestStats>,
}

impl RadioWorker {
    pub fn new(link: SupervisedLink, store: Arc<TelemetryStore>, stats: Arc<IngestStats>) -> Self {
        Self {
            link,
            framer: Framer::new(),
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
                // Bytes from the previous session can never complete a frame
                self.framer.reset();
            }
            Acquire::Open => {}
        }

        let mut buf = [0u8; READ_CHUNK_SIZE];
        match self.link.read(&mut buf).await {
            Ok(n) => {
                let before = self.framer.stats();
                let records = self.framer.feed(&buf[..n]);
                let after = self.framer.stats();

                self.stats
                    .radio_records
                    .fetch_add(records.len() as u64, Ordering::Relaxed);
                self.stats.radio_discarded.fetch_add(
                    after.bytes_discarded - before.bytes_discarded,
                    Ordering::Relaxed,
                );

                for record in records {
                    debug!("[{}] {:?}", self.link.name(), record);
                    self.store.apply(record.into());
                }
            }
            Err(e) if e.is_timeout() => {}
            Err(_) => self.framer.reset(),
        }
    }
}

#[async_trait]
impl IngestWorker for RadioWorker {
    async fn poll(&mut self) {
        RadioWorker::poll(self).await
    }

    fn reset(&mut self) {
        self.framer.reset();
    }
}
