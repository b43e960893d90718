//! # MAVLink Datagram Decoder
//!
//! Turns UDP telemetry datagrams into field updates.
//!
//! A datagram may carry several MAVLink frames back to back. Frames of
//! either protocol version are accepted; the version is picked from the
//! first byte of the datagram. Messages that carry nothing the snapshot
//! tracks are ignored.

use mavlink::common::{MavAutopilot, MavMessage, MavType, HEARTBEAT_DATA};
use mavlink::error::MessageReadError;
use mavlink::peek_reader::PeekReader;
use tracing::{debug, trace};

use crate::telemetry::{FieldUpdate, FlightMode, RcChannelMap};

/// Start-of-frame marker for MAVLink 1
const MAGIC_V1: u8 = 0xFE;

const MPS_TO_KMH: f64 = 3.6;

/// `hdg` value meaning "heading unknown" in GLOBAL_POSITION_INT
const HEADING_UNKNOWN: u16 = u16::MAX;

/// `satellites_visible` value meaning "unknown" in GPS_RAW_INT
const SATELLITES_UNKNOWN: u8 = u8::MAX;

/// Decodes one received datagram into field updates
#[cfg_attr(test, mockall::automock)]
pub trait DatagramDecoder: Send {
    /// Every update the datagram carries, in message order
    ///
    /// Undecodable input yields an empty list.
    fn decode(&mut self, datagram: &[u8]) -> Vec<FieldUpdate>;
}

/// [`DatagramDecoder`] for the MAVLink common dialect
#[derive(Debug, Default)]
pub struct MavlinkDecoder {
    messages: u64,
    rejected: u64,
}

impl MavlinkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages decoded so far
    pub fn messages(&self) -> u64 {
        self.messages
    }

    /// Frames that failed to parse
    pub fn rejected(&self) -> u64 {
        self.rejected
    }
}

impl DatagramDecoder for MavlinkDecoder {
    fn decode(&mut self, datagram: &[u8]) -> Vec<FieldUpdate> {
        let v1 = datagram.first() == Some(&MAGIC_V1);
        let mut reader = PeekReader::new(datagram);
        let mut updates = Vec::new();

        loop {
            let result = if v1 {
                mavlink::read_v1_msg::<MavMessage, _>(&mut reader)
            } else {
                mavlink::read_v2_msg::<MavMessage, _>(&mut reader)
            };

            match result {
                Ok((header, message)) => {
                    self.messages += 1;
                    trace!("MAVLink message from system {}", header.system_id);
                    updates.extend(message_updates(&message));
                }
                // End of the datagram
                Err(MessageReadError::Io(_)) => break,
                Err(e) => {
                    self.rejected += 1;
                    debug!("Skipping undecodable MAVLink frame: {:?}", e);
                }
            }
        }

        updates
    }
}

/// Whether a heartbeat comes from the vehicle's autopilot rather than a
/// ground station, gimbal, camera or companion computer
fn is_vehicle_heartbeat(data: &HEARTBEAT_DATA) -> bool {
    data.autopilot != MavAutopilot::MAV_AUTOPILOT_INVALID
        && !matches!(
            data.mavtype,
            MavType::MAV_TYPE_GCS
                | MavType::MAV_TYPE_ONBOARD_CONTROLLER
                | MavType::MAV_TYPE_GIMBAL
                | MavType::MAV_TYPE_CAMERA
        )
}

/// Field updates carried by one message
///
/// Altitude is height above home, taken from GLOBAL_POSITION_INT only.
pub fn message_updates(message: &MavMessage) -> Vec<FieldUpdate> {
    match message {
        MavMessage::GLOBAL_POSITION_INT(data) => {
            let mut updates = vec![
                FieldUpdate::Gps {
                    latitude: data.lat as f64 / 1e7,
                    longitude: data.lon as f64 / 1e7,
                },
                FieldUpdate::Altitude(data.relative_alt as f64 / 1000.0),
            ];
            if data.hdg != HEADING_UNKNOWN {
                updates.push(FieldUpdate::Heading(data.hdg as f64 / 100.0));
            }
            updates
        }
        MavMessage::VFR_HUD(data) => vec![
            FieldUpdate::Speed(data.groundspeed as f64 * MPS_TO_KMH),
            FieldUpdate::Heading(data.heading as f64),
        ],
        // -1 means the autopilot does not estimate remaining capacity
        MavMessage::SYS_STATUS(data) if data.battery_remaining >= 0 => {
            vec![FieldUpdate::Battery(data.battery_remaining as f64)]
        }
        MavMessage::GPS_RAW_INT(data) if data.satellites_visible != SATELLITES_UNKNOWN => {
            vec![FieldUpdate::Satellites(data.satellites_visible as u32)]
        }
        MavMessage::HEARTBEAT(data) if is_vehicle_heartbeat(data) => {
            vec![FieldUpdate::Mode(FlightMode::from_custom_mode(data.custom_mode))]
        }
        MavMessage::RC_CHANNELS(data) => {
            let raw = [
                data.chan1_raw,
                data.chan2_raw,
                data.chan3_raw,
                data.chan4_raw,
                data.chan5_raw,
                data.chan6_raw,
                data.chan7_raw,
                data.chan8_raw,
                data.chan9_raw,
                data.chan10_raw,
                data.chan11_raw,
                data.chan12_raw,
                data.chan13_raw,
                data.chan14_raw,
                data.chan15_raw,
                data.chan16_raw,
                data.chan17_raw,
                data.chan18_raw,
            ];
            let count = (data.chancount as usize).min(raw.len());
            let channels: RcChannelMap = raw[..count]
                .iter()
                .enumerate()
                .map(|(i, &pwm)| (format!("CH{}", i + 1), pwm as i32))
                .collect();
            vec![FieldUpdate::RcChannels(channels)]
        }
        _ => Vec::new(),
    }
}
