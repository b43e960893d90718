//! # Long-Range Radio Protocol Constants and Types
//!
//! Frame layout on the radio telemetry stream:
//!
//! ```text
//! [type tag: 1 byte][payload: fixed length per tag]
//! ```
//!
//! There is no sync byte, length field or checksum; the tag alone determines
//! how many bytes follow.

/// GPS fix record tag
pub const FRAMETYPE_GPS: u8 = 0x28;

/// GPS payload size (lat i32 BE + lon i32 BE)
pub const GPS_PAYLOAD_SIZE: usize = 8;

/// Coordinate scale: raw integers are degrees × 10^7
pub const COORDINATE_SCALE: f64 = 10_000_000.0;

/// Total frame size (tag + payload) for a known tag
///
/// Returns `None` for tags this decoder does not understand.
pub fn frame_size(tag: u8) -> Option<usize> {
    match tag {
        FRAMETYPE_GPS => Some(1 + GPS_PAYLOAD_SIZE),
        _ => None,
    }
}

/// GPS position fix
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsFix {
    /// Latitude in degrees (positive north)
    pub latitude: f64,

    /// Longitude in degrees (positive east)
    pub longitude: f64,
}

impl GpsFix {
    /// Encode as a complete radio frame (tag + payload)
    pub fn to_frame(&self) -> Vec<u8> {
        let lat = (self.latitude * COORDINATE_SCALE).round() as i32;
        let lon = (self.longitude * COORDINATE_SCALE).round() as i32;

        let mut frame = Vec::with_capacity(1 + GPS_PAYLOAD_SIZE);
        frame.push(FRAMETYPE_GPS);
        frame.extend_from_slice(&lat.to_be_bytes());
        frame.extend_from_slice(&lon.to_be_bytes());
        frame
    }
}

/// A typed record decoded from the radio stream
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedRecord {
    /// Position fix (tag 0x28)
    Gps(GpsFix),
}

/// One complete frame cut from the byte stream, not yet interpreted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    /// Type tag (first byte of the frame)
    pub tag: u8,

    /// Payload bytes following the tag
    pub payload: Vec<u8>,
}
