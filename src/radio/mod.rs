//! # Long-Range Radio Protocol Module
//!
//! Decoder for the telemetry stream received from the long-range radio link.
//!
//! This module handles:
//! - Frame layout and record tags
//! - Payload decoding (big-endian, ×10^7 coordinates)
//! - Partial-frame buffering and resynchronization on corrupt bytes

pub mod protocol;
pub mod decoder;
pub mod framer;
