//! # Radio Stream Framer
//!
//! Cuts the long-range radio byte stream into frames and decodes them.
//!
//! Reads from the serial link arrive in arbitrary chunks: a chunk may hold
//! several frames, a fraction of one, or leading garbage. The framer keeps
//! unconsumed bytes between calls and resynchronizes one byte at a time when
//! it meets a tag it does not recognize.
//!
//! ## Usage
//!
//! ```
//! use telemetry_relay::radio::framer::Framer;
//! use telemetry_relay::radio::protocol::DecodedRecord;
//!
//! let mut framer = Framer::new();
//!
//! // First half of a GPS frame: nothing decoded yet
//! assert!(framer.feed(&[0x28, 0x00, 0x00, 0x00]).is_empty());
//!
//! // Second half completes it
//! let records = framer.feed(&[0x0A, 0x00, 0x00, 0x00, 0x05]);
//! assert_eq!(records.len(), 1);
//! let DecodedRecord::Gps(fix) = &records[0];
//! assert!((fix.latitude - 0.000001).abs() < 1e-12);
//! ```

use bytes::{Buf, BytesMut};
use tracing::{debug, trace};

use super::decoder::decode_frame;
use super::protocol::{frame_size, DecodedRecord, RawFrame};

/// Counters describing what the framer has seen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FramerStats {
    /// Records successfully decoded
    pub records: u64,
    /// Bytes skipped while resynchronizing
    pub bytes_discarded: u64,
    /// Complete frames whose payload failed to decode
    pub malformed_frames: u64,
}

/// Stateful frame extractor for the radio stream
#[derive(Debug, Default)]
pub struct Framer {
    buffer: BytesMut,
    stats: FramerStats,
}

impl Framer {
    /// Create an empty framer
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume from previously buffered, unconsumed bytes
    pub fn with_pending(pending: &[u8]) -> Self {
        Self {
            buffer: BytesMut::from(pending),
            stats: FramerStats::default(),
        }
    }

    /// Append a chunk and return every record that is now complete
    ///
    /// Records are returned in stream order. A trailing partial frame stays
    /// buffered until a later chunk completes it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<DecodedRecord> {
        self.buffer.extend_from_slice(chunk);

        let mut records = Vec::new();
        while let Some(frame) = self.next_frame() {
            match decode_frame(&frame) {
                Ok(record) => {
                    trace!("Decoded radio record: {:?}", record);
                    self.stats.records += 1;
                    records.push(record);
                }
                Err(e) => {
                    debug!("Dropping radio frame: {}", e);
                    self.stats.malformed_frames += 1;
                }
            }
        }
        records
    }

    /// Bytes waiting for the rest of their frame
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    /// Discard buffered bytes (used when the link is re-acquired)
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    pub fn stats(&self) -> FramerStats {
        self.stats
    }

    /// Cut one frame from the buffer front, skipping unknown tags
    ///
    /// Returns `None` when the buffer is empty or holds only a partial frame.
    fn next_frame(&mut self) -> Option<RawFrame> {
        loop {
            let tag = *self.buffer.first()?;

            let Some(size) = frame_size(tag) else {
                // Unknown tag: drop exactly one byte and rescan
                self.buffer.advance(1);
                self.stats.bytes_discarded += 1;
                continue;
            };

            if self.buffer.len() < size {
                return None;
            }

            let frame = self.buffer.split_to(size);
            return Some(RawFrame {
                tag,
                payload: frame[1..].to_vec(),
            });
        }
    }
}

/// Pure form of the framer: `(pending, chunk) -> (pending', records)`
///
/// # Examples
///
/// ```
/// use telemetry_relay::radio::framer::decode_stream;
///
/// let (pending, records) = decode_stream(&[], &[0xFF, 0x28, 0x00]);
/// assert!(records.is_empty());
/// assert_eq!(pending, vec![0x28, 0x00]);
/// ```
pub fn decode_stream(pending: &[u8], chunk: &[u8]) -> (Vec<u8>, Vec<DecodedRecord>) {
    let mut framer = Framer::with_pending(pending);
    let records = framer.feed(chunk);
    (framer.pending().to_vec(), records)
}
