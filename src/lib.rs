//! # Telemetry Relay Library
//!
//! Move drone telemetry over several unreliable links at once.
//!
//! On the airside, every line from the flight controller is fanned out to
//! WiFi (UDP), Bluetooth and a long-range radio. On the groundstation, UDP
//! (MAVLink), the radio's binary packet stream and the RC transmitter's
//! channel lines are ingested concurrently and merged into one live
//! [`telemetry::TelemetrySnapshot`].

pub mod config;
pub mod error;
pub mod radio;
pub mod telemetry;
pub mod transport;
pub mod ingest;
pub mod relay;
