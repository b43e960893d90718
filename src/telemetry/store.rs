//! # Telemetry State Store
//!
//! The one shared, mutable vehicle snapshot.
//!
//! Every ingestion worker writes through [`TelemetryStore::apply`]; every
//! reader gets a full copy from [`TelemetryStore::read_snapshot`]. Each update
//! replaces exactly one field group under a short write lock, so a reader
//! sees any given group either entirely before or entirely after a write.
//!
//! Merge policy is last-writer-wins per field group. Nothing is ordered
//! across sources: a delayed transport can overwrite a fresher value from
//! another one. The per-group timestamps in [`FieldTimestamps`] let readers
//! judge staleness.
//!
//! [`FieldTimestamps`]: super::snapshot::FieldTimestamps
//!
//! ## Usage
//!
//! ```
//! use telemetry_relay::telemetry::{FieldUpdate, TelemetryStore};
//!
//! let store = TelemetryStore::new();
//! store.apply(FieldUpdate::Altitude(42.0));
//! store.apply(FieldUpdate::Heading(370.0));
//!
//! let snapshot = store.read_snapshot();
//! assert_eq!(snapshot.altitude, 42.0);
//! assert_eq!(snapshot.heading, 10.0);
//! ```

use chrono::Utc;
use parking_lot::RwLock;
use tracing::warn;

use super::snapshot::{wrap_heading, FieldUpdate, TelemetrySnapshot};

/// Shared live telemetry state
#[derive(Debug, Default)]
pub struct TelemetryStore {
    snapshot: RwLock<TelemetrySnapshot>,
}

impl TelemetryStore {
    /// Create a store holding the default (zeroed) snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace one field group
    ///
    /// Updates carrying NaN or infinite values are dropped.
    pub fn apply(&self, update: FieldUpdate) {
        if !update.is_finite() {
            warn!("Ignoring non-finite {:?} update", update.group());
            return;
        }
        let mut snapshot = self.snapshot.write();
        merge(&mut snapshot, update);
    }

    /// Apply several updates under one lock
    ///
    /// Used when one datagram carries several field groups so readers see
    /// them land together.
    pub fn apply_all<I>(&self, updates: I)
    where
        I: IntoIterator<Item = FieldUpdate>,
    {
        let updates: Vec<FieldUpdate> = updates
            .into_iter()
            .filter(|u| {
                let ok = u.is_finite();
                if !ok {
                    warn!("Ignoring non-finite {:?} update", u.group());
                }
                ok
            })
            .collect();

        if updates.is_empty() {
            return;
        }

        let mut snapshot = self.snapshot.write();
        for update in updates {
            merge(&mut snapshot, update);
        }
    }

    /// Copy of the current snapshot
    pub fn read_snapshot(&self) -> TelemetrySnapshot {
        self.snapshot.read().clone()
    }
}

fn merge(snapshot: &mut TelemetrySnapshot, update: FieldUpdate) {
    let group = update.group();

    match update {
        FieldUpdate::Altitude(v) => snapshot.altitude = v,
        FieldUpdate::Speed(v) => snapshot.speed = v,
        FieldUpdate::Battery(v) => snapshot.battery = v.clamp(0.0, 100.0),
        FieldUpdate::Gps {
            latitude,
            longitude,
        } => snapshot.gps = (latitude, longitude),
        FieldUpdate::Heading(v) => snapshot.heading = wrap_heading(v),
        FieldUpdate::Satellites(n) => snapshot.satellites = n,
        FieldUpdate::Mode(mode) => snapshot.mode = mode,
        FieldUpdate::RcChannels(channels) => snapshot.rc_channels = channels,
    }

    snapshot.updated.touch(group, Utc::now());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::snapshot::{FieldGroup, FlightMode, RcChannelMap};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_field_groups_are_independent() {
        let store = TelemetryStore::new();

        let mut channels = RcChannelMap::new();
        channels.insert("CH1".to_string(), 1500);
        store.apply(FieldUpdate::RcChannels(channels.clone()));
        store.apply(FieldUpdate::Gps {
            latitude: 10.0,
            longitude: 20.0,
        });

        let snapshot = store.read_snapshot();
        assert_eq!(snapshot.rc_channels, channels);
        assert_eq!(snapshot.gps, (10.0, 20.0));
        assert_eq!(snapshot.altitude, 0.0);
    }

    #[test]
    fn test_last_writer_wins() {
        let store = TelemetryStore::new();
        store.apply(FieldUpdate::Battery(80.0));
        store.apply(FieldUpdate::Battery(95.0));
        assert_eq!(store.read_snapshot().battery, 95.0);
    }

    #[test]
    fn test_rc_channels_replaced_as_group() {
        let store = TelemetryStore::new();

        let mut first = RcChannelMap::new();
        first.insert("CH1".to_string(), 1500);
        first.insert("CH2".to_string(), 1200);
        store.apply(FieldUpdate::RcChannels(first));

        let mut second = RcChannelMap::new();
        second.insert("CH3".to_string(), 1000);
        store.apply(FieldUpdate::RcChannels(second.clone()));

        assert_eq!(store.read_snapshot().rc_channels, second);
    }

    #[test]
    fn test_normalization() {
        let store = TelemetryStore::new();
        store.apply(FieldUpdate::Heading(-10.0));
        store.apply(FieldUpdate::Battery(140.0));

        let snapshot = store.read_snapshot();
        assert_eq!(snapshot.heading, 350.0);
        assert_eq!(snapshot.battery, 100.0);
    }

    #[test]
    fn test_non_finite_update_ignored() {
        let store = TelemetryStore::new();
        store.apply(FieldUpdate::Altitude(12.0));
        store.apply(FieldUpdate::Altitude(f64::NAN));

        let snapshot = store.read_snapshot();
        assert_eq!(snapshot.altitude, 12.0);
    }

    #[test]
    fn test_timestamps_track_groups() {
        let store = TelemetryStore::new();
        store.apply(FieldUpdate::Mode(FlightMode::Loiter));

        let updated = store.read_snapshot().updated;
        assert!(updated.get(FieldGroup::Mode).is_some());
        assert!(updated.get(FieldGroup::Gps).is_none());
    }

    #[test]
    fn test_apply_all() {
        let store = TelemetryStore::new();
        store.apply_all(vec![
            FieldUpdate::Altitude(100.0),
            FieldUpdate::Speed(f64::INFINITY),
            FieldUpdate::Satellites(9),
        ]);

        let snapshot = store.read_snapshot();
        assert_eq!(snapshot.altitude, 100.0);
        assert_eq!(snapshot.speed, 0.0);
        assert_eq!(snapshot.satellites, 9);
    }

    #[test]
    fn test_concurrent_writers_never_tear_groups() {
        let store = Arc::new(TelemetryStore::new());

        // GPS writer always writes lat == lon, altitude writer a rising value
        let gps_store = Arc::clone(&store);
        let gps_writer = thread::spawn(move || {
            for i in 0..5_000 {
                let v = i as f64;
                gps_store.apply(FieldUpdate::Gps {
                    latitude: v,
                    longitude: v,
                });
            }
        });

        let alt_store = Arc::clone(&store);
        let alt_writer = thread::spawn(move || {
            for i in 0..5_000 {
                alt_store.apply(FieldUpdate::Altitude(i as f64));
            }
        });

        let reader_store = Arc::clone(&store);
        let reader = thread::spawn(move || {
            let mut last_alt = 0.0;
            for _ in 0..5_000 {
                let snapshot = reader_store.read_snapshot();
                assert_eq!(snapshot.gps.0, snapshot.gps.1, "torn gps group");
                assert!(snapshot.altitude >= last_alt);
                last_alt = snapshot.altitude;
            }
        });

        gps_writer.join().unwrap();
        alt_writer.join().unwrap();
        reader.join().unwrap();

        let snapshot = store.read_snapshot();
        assert_eq!(snapshot.gps, (4999.0, 4999.0));
        assert_eq!(snapshot.altitude, 4999.0);
    }
}
