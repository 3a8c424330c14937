//! Outbound records and the collaborators that receive them.
//!
//! The tracking core never persists anything itself. Alerts, finalized
//! regions and routes are handed to the traits below; the host app wires
//! them to its notification store and document database.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::geofence::GeofenceEvent;
use crate::{Bounds, GeoPoint};

/// A geofence crossing, written once to the alert log.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AlertEvent {
    pub kind: GeofenceEvent,
    pub device_id: String,
    pub session_id: u64,
    /// Where the device was when the crossing was detected
    pub location: GeoPoint,
    /// Distance to the circle center or polygon centroid
    pub distance_from_center_meters: f64,
    pub distance_from_boundary_meters: f64,
    /// Timestamp of the fix that triggered the event (Unix millis)
    pub occurred_at: i64,
}

/// Snapshot of a tracked route for persistence.
///
/// Bounds and center are pre-computed so history screens can frame the map
/// without walking the points again.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RouteRecord {
    pub session_id: u64,
    pub device_id: String,
    /// Display path, in arrival order
    pub points: Vec<GeoPoint>,
    pub distance_meters: f64,
    pub bounds: Option<Bounds>,
    pub center: Option<GeoPoint>,
    pub started_at: Option<i64>,
    pub last_fix_at: Option<i64>,
}

/// Receives geofence alerts. Called exactly once per emitted event.
pub trait AlertSink {
    fn emit(&mut self, event: &AlertEvent);
}

impl<F> AlertSink for F
where
    F: FnMut(&AlertEvent),
{
    fn emit(&mut self, event: &AlertEvent) {
        self(event)
    }
}

/// Persists finalized regions. Receives the whole vertex list in one call;
/// in-progress drawings are never passed here.
pub trait RegionStore {
    fn save_region(&mut self, device_id: &str, vertices: &[GeoPoint]);
}

/// Persists route snapshots, periodically and when tracking stops.
pub trait RouteStore {
    fn save_route(&mut self, record: &RouteRecord);
}

// ============================================================================
// In-memory recorder
// ============================================================================

#[derive(Debug, Default)]
struct Recorded {
    alerts: Vec<AlertEvent>,
    regions: Vec<(String, Vec<GeoPoint>)>,
    routes: Vec<RouteRecord>,
}

/// Shared in-memory implementation of every collaborator.
///
/// Clones share the same log, so one handle can be boxed into an engine
/// while another is kept for inspection. Useful in tests, demos and as a
/// buffer in front of a slower store.
#[derive(Debug, Clone, Default)]
pub struct MemoryLog {
    inner: Arc<Mutex<Recorded>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn alerts(&self) -> Vec<AlertEvent> {
        self.lock().alerts.clone()
    }

    pub fn regions(&self) -> Vec<(String, Vec<GeoPoint>)> {
        self.lock().regions.clone()
    }

    pub fn routes(&self) -> Vec<RouteRecord> {
        self.lock().routes.clone()
    }
}

impl AlertSink for MemoryLog {
    fn emit(&mut self, event: &AlertEvent) {
        self.lock().alerts.push(event.clone());
    }
}

impl RegionStore for MemoryLog {
    fn save_region(&mut self, device_id: &str, vertices: &[GeoPoint]) {
        self.lock().regions.push((device_id.to_string(), vertices.to_vec()));
    }
}

impl RouteStore for MemoryLog {
    fn save_route(&mut self, record: &RouteRecord) {
        self.lock().routes.push(record.clone());
    }
}
