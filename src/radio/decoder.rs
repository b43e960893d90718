//! # Radio Record Decoder
//!
//! Interprets complete [`RawFrame`]s as typed [`DecodedRecord`]s.

use super::protocol::*;
use crate::error::{RelayError, Result};

/// Decode a raw frame into a typed record
///
/// # Errors
///
/// Returns `MalformedFrame` if the tag is unknown or the payload is too short.
pub fn decode_frame(frame: &RawFrame) -> Result<DecodedRecord> {
    match frame.tag {
        FRAMETYPE_GPS => decode_gps(&frame.payload).map(DecodedRecord::Gps),
        other => Err(RelayError::MalformedFrame(format!(
            "Unknown record tag: 0x{:02X}",
            other
        ))),
    }
}

/// Decode GPS payload
///
/// # Arguments
///
/// * `payload` - GPS payload (8 bytes)
///
/// # Returns
///
/// * `Result<GpsFix>` - Decoded position in degrees
pub fn decode_gps(payload: &[u8]) -> Result<GpsFix> {
    if payload.len() < GPS_PAYLOAD_SIZE {
        return Err(RelayError::MalformedFrame(format!(
            "GPS payload too short: {} bytes",
            payload.len()
        )));
    }

    // Latitude: 4 bytes, big-endian, degrees × 10^7
    let lat_raw = i32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);

    // Longitude: 4 bytes, big-endian, degrees × 10^7
    let lon_raw = i32::from_be_bytes([payload[4], payload[5], payload[6], payload[7]]);

    Ok(GpsFix {
        latitude: lat_raw as f64 / COORDINATE_SCALE,
        longitude: lon_raw as f64 / COORDINATE_SCALE,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_gps_small_values() {
        let payload = [0x00, 0x00, 0x00, 0x0A, 0x00, 0x00, 0x00, 0x05];
        let gps = decode_gps(&payload).unwrap();

        assert!((gps.latitude - 0.000001).abs() < 1e-12);
        assert!((gps.longitude - 0.0000005).abs() < 1e-12);
    }

    #[test]
    fn test_decode_gps_signed() {
        // 37.7749° N, -122.4194° W
        let lat_raw: i32 = 377_749_000;
        let lon_raw: i32 = -1_224_194_000;

        let mut payload = Vec::new();
        payload.extend_from_slice(&lat_raw.to_be_bytes());
        payload.extend_from_slice(&lon_raw.to_be_bytes());

        let gps = decode_gps(&payload).unwrap();
        assert!((gps.latitude - 37.7749).abs() < 1e-9);
        assert!((gps.longitude - (-122.4194)).abs() < 1e-9);
    }

    #[test]
    fn test_decode_gps_too_short() {
        let result = decode_gps(&[0u8; 5]);
        assert!(matches!(result, Err(RelayError::MalformedFrame(_))));
    }

    #[test]
    fn test_decode_frame_dispatches_by_tag() {
        let frame = RawFrame {
            tag: FRAMETYPE_GPS,
            payload: vec![0, 0, 0, 1, 0, 0, 0, 2],
        };
        match decode_frame(&frame).unwrap() {
            DecodedRecord::Gps(fix) => {
                assert!((fix.latitude - 1e-7).abs() < 1e-15);
                assert!((fix.longitude - 2e-7).abs() < 1e-15);
            }
        }
    }

    #[test]
    fn test_decode_frame_unknown_tag() {
        let frame = RawFrame {
            tag: 0x99,
            payload: vec![],
        };
        let err = decode_frame(&frame).unwrap_err();
        assert!(err.to_string().contains("0x99"));
    }
}
