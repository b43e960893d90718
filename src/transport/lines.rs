//! Newline framing for line-oriented serial streams

use bytes::{Bytes, BytesMut};

/// Longest line kept before it is flushed without a terminator
pub const MAX_LINE_LENGTH: usize = 4096;

/// Accumulates chunks and yields complete `\n`-terminated lines
///
/// Lines keep their terminator so they can be forwarded byte-for-byte.
#[derive(Debug, Default)]
pub struct LineSplitter {
    buffer: BytesMut,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk; return every line it completes, in order
    ///
    /// A run longer than [`MAX_LINE_LENGTH`] without a newline is emitted
    /// as-is so the buffer cannot grow without bound.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Bytes> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            lines.push(self.buffer.split_to(pos + 1).freeze());
        }

        while self.buffer.len() > MAX_LINE_LENGTH {
            lines.push(self.buffer.split_to(MAX_LINE_LENGTH).freeze());
        }
        lines
    }

    /// Take whatever partial line is buffered
    ///
    /// Called when the link goes quiet so an unterminated tail is not held
    /// back indefinitely.
    pub fn take_partial(&mut self) -> Option<Bytes> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(self.buffer.split().freeze())
        }
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
