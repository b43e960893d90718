//! # Telemetry Snapshot Types
//!
//! The live vehicle state and the field-group updates that mutate it.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// RC channel map: channel id (e.g. `"CH1"`) to pulse width in microseconds
pub type RcChannelMap = HashMap<String, i32>;

/// Flight mode reported by the flight controller
///
/// Named after the ArduPilot copter modes; `Manual` is the state before any
/// heartbeat has been seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlightMode {
    #[default]
    Manual,
    Stabilize,
    Acro,
    AltHold,
    Auto,
    Guided,
    Loiter,
    Rtl,
    Land,
    /// Custom mode number with no known name
    Unknown(u32),
}

impl FlightMode {
    /// Map an ArduCopter `custom_mode` value to a flight mode
    pub fn from_custom_mode(custom_mode: u32) -> Self {
        match custom_mode {
            0 => FlightMode::Stabilize,
            1 => FlightMode::Acro,
            2 => FlightMode::AltHold,
            3 => FlightMode::Auto,
            4 => FlightMode::Guided,
            5 => FlightMode::Loiter,
            6 => FlightMode::Rtl,
            9 => FlightMode::Land,
            other => FlightMode::Unknown(other),
        }
    }
}

impl fmt::Display for FlightMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlightMode::Manual => write!(f, "MANUAL"),
            FlightMode::Stabilize => write!(f, "STABILIZE"),
            FlightMode::Acro => write!(f, "ACRO"),
            FlightMode::AltHold => write!(f, "ALT_HOLD"),
            FlightMode::Auto => write!(f, "AUTO"),
            FlightMode::Guided => write!(f, "GUIDED"),
            FlightMode::Loiter => write!(f, "LOITER"),
            FlightMode::Rtl => write!(f, "RTL"),
            FlightMode::Land => write!(f, "LAND"),
            FlightMode::Unknown(n) => write!(f, "MODE_{}", n),
        }
    }
}

/// Independently-updatable slices of the snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldGroup {
    Altitude,
    Speed,
    Battery,
    Gps,
    Heading,
    Satellites,
    Mode,
    RcChannels,
}

/// When each field group was last written (`None` = never)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct FieldTimestamps {
    pub altitude: Option<DateTime<Utc>>,
    pub speed: Option<DateTime<Utc>>,
    pub battery: Option<DateTime<Utc>>,
    pub gps: Option<DateTime<Utc>>,
    pub heading: Option<DateTime<Utc>>,
    pub satellites: Option<DateTime<Utc>>,
    pub mode: Option<DateTime<Utc>>,
    pub rc_channels: Option<DateTime<Utc>>,
}

impl FieldTimestamps {
    pub fn get(&self, group: FieldGroup) -> Option<DateTime<Utc>> {
        match group {
            FieldGroup::Altitude => self.altitude,
            FieldGroup::Speed => self.speed,
            FieldGroup::Battery => self.battery,
            FieldGroup::Gps => self.gps,
            FieldGroup::Heading => self.heading,
            FieldGroup::Satellites => self.satellites,
            FieldGroup::Mode => self.mode,
            FieldGroup::RcChannels => self.rc_channels,
        }
    }

    pub(crate) fn touch(&mut self, group: FieldGroup, at: DateTime<Utc>) {
        let slot = match group {
            FieldGroup::Altitude => &mut self.altitude,
            FieldGroup::Speed => &mut self.speed,
            FieldGroup::Battery => &mut self.battery,
            FieldGroup::Gps => &mut self.gps,
            FieldGroup::Heading => &mut self.heading,
            FieldGroup::Satellites => &mut self.satellites,
            FieldGroup::Mode => &mut self.mode,
            FieldGroup::RcChannels => &mut self.rc_channels,
        };
        *slot = Some(at);
    }
}

/// Live vehicle state as seen by the groundstation
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TelemetrySnapshot {
    /// Altitude in meters
    pub altitude: f64,

    /// Ground speed in km/h
    pub speed: f64,

    /// Battery remaining in percent
    pub battery: f64,

    /// (latitude, longitude) in degrees
    pub gps: (f64, f64),

    /// Heading in degrees, within [0, 360)
    pub heading: f64,

    /// Satellites in view
    pub satellites: u32,

    pub mode: FlightMode,

    pub rc_channels: RcChannelMap,

    /// Last write time per field group
    pub updated: FieldTimestamps,
}

/// One field-group write
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    Altitude(f64),
    Speed(f64),
    Battery(f64),
    Gps { latitude: f64, longitude: f64 },
    Heading(f64),
    Satellites(u32),
    Mode(FlightMode),
    RcChannels(RcChannelMap),
}

impl FieldUpdate {
    /// The field group this update replaces
    pub fn group(&self) -> FieldGroup {
        match self {
            FieldUpdate::Altitude(_) => FieldGroup::Altitude,
            FieldUpdate::Speed(_) => FieldGroup::Speed,
            FieldUpdate::Battery(_) => FieldGroup::Battery,
            FieldUpdate::Gps { .. } => FieldGroup::Gps,
            FieldUpdate::Heading(_) => FieldGroup::Heading,
            FieldUpdate::Satellites(_) => FieldGroup::Satellites,
            FieldUpdate::Mode(_) => FieldGroup::Mode,
            FieldUpdate::RcChannels(_) => FieldGroup::RcChannels,
        }
    }

    /// False if any float in the update is NaN or infinite
    pub fn is_finite(&self) -> bool {
        match self {
            FieldUpdate::Altitude(v)
            | FieldUpdate::Speed(v)
            | FieldUpdate::Battery(v)
            | FieldUpdate::Heading(v) => v.is_finite(),
            FieldUpdate::Gps {
                latitude,
                longitude,
            } => latitude.is_finite() && longitude.is_finite(),
            FieldUpdate::Satellites(_) | FieldUpdate::Mode(_) | FieldUpdate::RcChannels(_) => true,
        }
    }
}

/// Wrap an angle in degrees into [0, 360)
pub fn wrap_heading(degrees: f64) -> f64 {
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}
