//! # Telemetry Module
//!
//! Live vehicle state shared between ingestion workers and readers.
//!
//! This module handles:
//! - The snapshot data model and field-group updates
//! - The shared store with last-writer-wins merging
//! - Periodic JSONL recording of the snapshot with file rotation

pub mod snapshot;
pub mod store;
pub mod recorder;

pub use snapshot::{FieldGroup, FieldUpdate, FlightMode, RcChannelMap, TelemetrySnapshot};
pub use store::TelemetryStore;
