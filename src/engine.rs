//! # Tracking Engine
//!
//! Registry of tracking sessions and geofence regions, keyed by device id.
//!
//! The host app tells the engine which device to track; the engine never
//! looks up an "active device" on its own. Each device gets its own
//! session, containment state and region, so tracking several pets at once
//! cannot mix their paths, distances or alerts.
//!
//! Sessions carry a monotonically issued id. Fixes delivered through
//! [`TrackingEngine::ingest_poll`] name the session they were fetched for,
//! and a fix that arrives after that session was stopped or replaced is
//! rejected instead of leaking into the new baseline.

use std::collections::HashMap;
use std::fmt;

use log::{debug, info, warn};

use crate::alerts::{AlertEvent, AlertSink, RegionStore, RouteRecord, RouteStore};
use crate::editor::PolygonEditor;
use crate::error::{Result, TrackerError};
use crate::geofence::{ContainmentState, GeofenceRegion};
use crate::path_filter::AppendOutcome;
use crate::session::TrackingSession;
use crate::{Fix, TrackerConfig};

/// What happened to one ingested fix.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct IngestReport {
    pub session_id: u64,
    pub outcome: AppendOutcome,
    pub containment: ContainmentState,
    /// Alert emitted by this fix, already dispatched to the alert sink
    pub alert: Option<AlertEvent>,
    pub accumulated_distance_meters: f64,
}

/// Per-device session and region registry.
pub struct TrackingEngine {
    config: TrackerConfig,
    sessions: HashMap<String, TrackingSession>,
    regions: HashMap<String, GeofenceRegion>,
    next_session_id: u64,
    alert_sink: Option<Box<dyn AlertSink + Send>>,
    region_store: Option<Box<dyn RegionStore + Send>>,
    route_store: Option<Box<dyn RouteStore + Send>>,
}

impl fmt::Debug for TrackingEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackingEngine")
            .field("config", &self.config)
            .field("devices", &self.sessions.keys().collect::<Vec<_>>())
            .field("regions", &self.regions.len())
            .field("next_session_id", &self.next_session_id)
            .finish()
    }
}

impl Default for TrackingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackingEngine {
    /// Create an engine with default thresholds and no collaborators.
    pub fn new() -> Self {
        Self {
            config: TrackerConfig::default(),
            sessions: HashMap::new(),
            regions: HashMap::new(),
            next_session_id: 1,
            alert_sink: None,
            region_store: None,
            route_store: None,
        }
    }

    /// Create an engine with custom thresholds.
    pub fn with_config(config: TrackerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, ..Self::new() })
    }

    pub fn with_alert_sink(mut self, sink: impl AlertSink + Send + 'static) -> Self {
        self.alert_sink = Some(Box::new(sink));
        self
    }

    pub fn with_region_store(mut self, store: impl RegionStore + Send + 'static) -> Self {
        self.region_store = Some(Box::new(store));
        self
    }

    pub fn with_route_store(mut self, store: impl RouteStore + Send + 'static) -> Self {
        self.route_store = Some(Box::new(store));
        self
    }

    pub fn set_alert_sink(&mut self, sink: Box<dyn AlertSink + Send>) {
        self.alert_sink = Some(sink);
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Replace the thresholds used by sessions started from now on.
    /// Running sessions keep the configuration they started with.
    pub fn set_config(&mut self, config: TrackerConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    // ========================================================================
    // Session Lifecycle
    // ========================================================================

    /// Start tracking a device from an empty baseline.
    ///
    /// An existing session for the same device is replaced without being
    /// saved; call [`stop_tracking`](Self::stop_tracking) first to keep it.
    pub fn start_tracking(&mut self, device_id: &str) -> u64 {
        let session_id = self.issue_session_id();
        let session = TrackingSession::new(session_id, device_id, self.config.clone());
        if self.sessions.insert(device_id.to_string(), session).is_some() {
            warn!("Replaced running session for {}", device_id);
        }
        info!("Started session {} for {}", session_id, device_id);
        session_id
    }

    /// Stop tracking a device and hand its final route to the route store.
    ///
    /// Distance already accumulated and alerts already emitted stand; the
    /// returned record is the last word on the session.
    pub fn stop_tracking(&mut self, device_id: &str) -> Option<RouteRecord> {
        let session = self.sessions.remove(device_id)?;
        let record = session.route_record();
        info!(
            "Stopped session {} for {}: {} points, {:.0}m",
            record.session_id,
            device_id,
            record.points.len(),
            record.distance_meters
        );
        if let Some(store) = self.route_store.as_mut() {
            store.save_route(&record);
        }
        Some(record)
    }

    /// Stop tracking `from` (if tracked) and start a fresh session for `to`.
    pub fn switch_device(&mut self, from: &str, to: &str) -> u64 {
        self.stop_tracking(from);
        self.start_tracking(to)
    }

    pub fn session(&self, device_id: &str) -> Option<&TrackingSession> {
        self.sessions.get(device_id)
    }

    pub fn is_tracking(&self, device_id: &str) -> bool {
        self.sessions.contains_key(device_id)
    }

    /// Tracked device ids, sorted.
    pub fn tracked_devices(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.keys().cloned().collect();
        ids.sort();
        ids
    }

    // ========================================================================
    // Fix Ingestion
    // ========================================================================

    /// Feed a fix to a device's current session.
    ///
    /// Runs the path filter and distance accumulator, then re-evaluates the
    /// device's geofence (if one is set) and dispatches any resulting alert
    /// to the alert sink exactly once.
    pub fn ingest_fix(&mut self, device_id: &str, fix: Fix) -> Result<IngestReport> {
        let session = self
            .sessions
            .get_mut(device_id)
            .ok_or_else(|| TrackerError::NotTracking(device_id.to_string()))?;

        let outcome = session.append_fix(fix).map_err(|e| {
            warn!("Rejected fix for {}: {}", device_id, e);
            e
        })?;

        let mut alert = None;
        if let Some(region) = self.regions.get(device_id) {
            let evaluation = session.evaluate_containment(&fix.point, region);
            if let Some(kind) = evaluation.event {
                alert = Some(AlertEvent {
                    kind,
                    device_id: device_id.to_string(),
                    session_id: session.session_id(),
                    location: fix.point,
                    distance_from_center_meters: region.distance_from_center(&fix.point),
                    distance_from_boundary_meters: region.distance_from_boundary(&fix.point),
                    occurred_at: fix.timestamp,
                });
            }
        }

        let report = IngestReport {
            session_id: session.session_id(),
            outcome,
            containment: session.containment(),
            alert,
            accumulated_distance_meters: session.accumulated_distance_meters(),
        };

        if let Some(event) = report.alert.as_ref() {
            info!(
                "Geofence {:?} for {} at ({:.6}, {:.6}), {:.0}m from boundary",
                event.kind,
                device_id,
                event.location.latitude,
                event.location.longitude,
                event.distance_from_boundary_meters
            );
            if let Some(sink) = self.alert_sink.as_mut() {
                sink.emit(event);
            }
        }

        Ok(report)
    }

    /// Feed the result of one poll tick.
    ///
    /// `None` means the tick produced no usable fix; that is not an error
    /// and leaves every path, distance and containment state untouched.
    /// A fix fetched for a session that is no longer current is rejected
    /// with [`TrackerError::SessionEnded`].
    pub fn ingest_poll(
        &mut self,
        device_id: &str,
        session_id: u64,
        fix: Option<Fix>,
    ) -> Result<Option<IngestReport>> {
        match self.sessions.get(device_id) {
            Some(session) if session.session_id() == session_id => {}
            _ => {
                return Err(TrackerError::SessionEnded {
                    device_id: device_id.to_string(),
                    session_id,
                })
            }
        }

        match fix {
            Some(fix) => self.ingest_fix(device_id, fix).map(Some),
            None => {
                debug!("No fix this tick for {}", device_id);
                Ok(None)
            }
        }
    }

    // ========================================================================
    // Regions
    // ========================================================================

    /// Install or replace a device's geofence.
    ///
    /// Replacing a region starts a new device/region pairing, so the
    /// containment baseline is reset and the next fix alerts nothing.
    pub fn set_region(&mut self, device_id: &str, region: GeofenceRegion) {
        if let Some(session) = self.sessions.get_mut(device_id) {
            session.reset_containment();
        }
        info!("Geofence set for {}", device_id);
        self.regions.insert(device_id.to_string(), region);
    }

    /// Finalize an editor's drawing, persist it and install it.
    ///
    /// On failure (too few vertices, not drawing) nothing is persisted and
    /// the current region stays in place.
    pub fn commit_editor(&mut self, device_id: &str, editor: &mut PolygonEditor) -> Result<()> {
        let region = editor.finalize()?;
        if let Some(store) = self.region_store.as_mut() {
            store.save_region(device_id, region.vertices());
        }
        self.set_region(device_id, region);
        Ok(())
    }

    pub fn clear_region(&mut self, device_id: &str) -> Option<GeofenceRegion> {
        if let Some(session) = self.sessions.get_mut(device_id) {
            session.reset_containment();
        }
        self.regions.remove(device_id)
    }

    pub fn region(&self, device_id: &str) -> Option<&GeofenceRegion> {
        self.regions.get(device_id)
    }

    // ========================================================================
    // Route Persistence
    // ========================================================================

    /// Hand the current route of a running session to the route store.
    pub fn flush_route(&mut self, device_id: &str) -> Option<RouteRecord> {
        let record = self.sessions.get(device_id)?.route_record();
        if let Some(store) = self.route_store.as_mut() {
            store.save_route(&record);
        }
        Some(record)
    }

    fn issue_session_id(&mut self) -> u64 {
        let id = self.next_session_id;
        self.next_session_id += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::MemoryLog;
    use crate::geofence::GeofenceEvent;
    use crate::GeoPoint;

    fn fix(lat: f64, lng: f64, ts: i64) -> Fix {
        Fix::new(GeoPoint::new(lat, lng), ts)
    }

    fn square() -> GeofenceRegion {
        GeofenceRegion::polygon(vec![
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(0.0, 0.01),
            GeoPoint::new(0.01, 0.01),
            GeoPoint::new(0.01, 0.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_end_to_end_square() {
        let log = MemoryLog::new();
        let mut engine = TrackingEngine::new().with_alert_sink(log.clone());
        engine.start_tracking("collar-1");
        engine.set_region("collar-1", square());

        let first = engine.ingest_fix("collar-1", fix(0.005, 0.005, 0)).unwrap();
        assert_eq!(first.alert, None);
        assert_eq!(first.containment, ContainmentState::Inside);

        let second = engine.ingest_fix("collar-1", fix(0.02, 0.02, 5_000)).unwrap();
        assert_eq!(second.alert.as_ref().map(|a| a.kind), Some(GeofenceEvent::Exit));

        let third = engine.ingest_fix("collar-1", fix(0.005, 0.005, 10_000)).unwrap();
        assert_eq!(third.alert.as_ref().map(|a| a.kind), Some(GeofenceEvent::Enter));

        let session = engine.session("collar-1").unwrap();
        assert_eq!(session.containment().is_inside(), Some(true));

        let alerts = log.alerts();
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].kind, GeofenceEvent::Exit);
        assert_eq!(alerts[0].occurred_at, 5_000);
        assert!(alerts[0].distance_from_boundary_meters > 1000.0);
        assert_eq!(alerts[1].kind, GeofenceEvent::Enter);
    }

    #[test]
    fn test_devices_are_isolated() {
        let mut engine = TrackingEngine::new();
        engine.start_tracking("collar-1");
        engine.start_tracking("collar-2");
        engine.set_region("collar-1", square());

        for (i, lng) in [0.0, 0.001, 0.002].into_iter().enumerate() {
            engine.ingest_fix("collar-1", fix(0.0, lng, i as i64)).unwrap();
        }
        engine.ingest_fix("collar-2", fix(40.0, -74.0, 0)).unwrap();

        let one = engine.session("collar-1").unwrap();
        let two = engine.session("collar-2").unwrap();
        assert!(one.accumulated_distance_meters() > 200.0);
        assert_eq!(two.accumulated_distance_meters(), 0.0);
        assert_eq!(two.raw_path().len(), 1);
        assert_eq!(two.containment(), ContainmentState::Unknown);
        assert_ne!(one.session_id(), two.session_id());
        assert_eq!(engine.tracked_devices(), vec!["collar-1", "collar-2"]);
    }

    #[test]
    fn test_missing_fix_leaves_state_intact() {
        let mut engine = TrackingEngine::new();
        let session_id = engine.start_tracking("collar-1");
        engine.ingest_poll("collar-1", session_id, Some(fix(0.0, 0.0, 0))).unwrap();
        engine.ingest_poll("collar-1", session_id, Some(fix(0.0, 0.001, 1))).unwrap();
        let before = engine.session("collar-1").unwrap().accumulated_distance_meters();

        assert_eq!(engine.ingest_poll("collar-1", session_id, None).unwrap(), None);

        let session = engine.session("collar-1").unwrap();
        assert_eq!(session.accumulated_distance_meters(), before);
        assert_eq!(session.raw_path().len(), 2);
    }

    #[test]
    fn test_stale_fix_rejected_after_stop() {
        let log = MemoryLog::new();
        let mut engine = TrackingEngine::new().with_route_store(log.clone());
        let session_id = engine.start_tracking("collar-1");
        engine.ingest_poll("collar-1", session_id, Some(fix(0.0, 0.0, 0))).unwrap();
        engine.ingest_poll("collar-1", session_id, Some(fix(0.0, 0.001, 1))).unwrap();

        let record = engine.stop_tracking("collar-1").unwrap();
        assert!(record.distance_meters > 100.0);
        assert_eq!(log.routes(), vec![record]);

        let err = engine
            .ingest_poll("collar-1", session_id, Some(fix(0.0, 0.002, 2)))
            .unwrap_err();
        assert!(matches!(err, TrackerError::SessionEnded { .. }));

        // A restarted session does not accept fixes fetched for the old one
        let restarted = engine.start_tracking("collar-1");
        assert_ne!(restarted, session_id);
        assert!(engine.ingest_poll("collar-1", session_id, Some(fix(0.0, 0.002, 3))).is_err());
        assert!(engine.session("collar-1").unwrap().raw_path().is_empty());
    }

    #[test]
    fn test_switch_device_starts_from_baseline() {
        let mut engine = TrackingEngine::new();
        engine.start_tracking("collar-1");
        engine.set_region("collar-1", square());
        engine.ingest_fix("collar-1", fix(0.005, 0.005, 0)).unwrap();
        engine.ingest_fix("collar-1", fix(0.005, 0.008, 1)).unwrap();

        let first_id = engine.session("collar-1").unwrap().session_id();
        assert_eq!(engine.session("collar-1").unwrap().containment(), ContainmentState::Inside);

        let second_id = engine.switch_device("collar-1", "collar-2");
        assert!(!engine.is_tracking("collar-1"));
        assert!(second_id > first_id);

        let session = engine.session("collar-2").unwrap();
        assert_eq!(session.session_id(), second_id);
        assert_eq!(session.device_id(), "collar-2");
        assert!(session.raw_path().is_empty());
        assert!(session.display_path().is_empty());
        assert_eq!(session.accumulated_distance_meters(), 0.0);
        assert_eq!(session.containment(), ContainmentState::Unknown);

        // Switching back starts over as well
        engine.ingest_fix("collar-2", fix(0.005, 0.005, 2)).unwrap();
        engine.switch_device("collar-2", "collar-1");
        let session = engine.session("collar-1").unwrap();
        assert!(session.raw_path().is_empty());
        assert_eq!(session.containment(), ContainmentState::Unknown);
    }

    #[test]
    fn test_untracked_device() {
        let mut engine = TrackingEngine::new();
        assert_eq!(
            engine.ingest_fix("ghost", fix(0.0, 0.0, 0)).unwrap_err(),
            TrackerError::NotTracking("ghost".into())
        );
        assert!(engine.stop_tracking("ghost").is_none());
    }

    #[test]
    fn test_invalid_fix_does_not_touch_containment() {
        let mut engine = TrackingEngine::new();
        engine.start_tracking("collar-1");
        engine.set_region("collar-1", square());
        engine.ingest_fix("collar-1", fix(0.005, 0.005, 0)).unwrap();

        assert!(engine.ingest_fix("collar-1", fix(120.0, 0.0, 1)).is_err());
        let session = engine.session("collar-1").unwrap();
        assert_eq!(session.containment(), ContainmentState::Inside);
        assert_eq!(session.raw_path().len(), 1);
    }

    #[test]
    fn test_commit_editor_persists_and_resets_baseline() {
        let log = MemoryLog::new();
        let mut engine = TrackingEngine::new()
            .with_region_store(log.clone())
            .with_alert_sink(log.clone());
        engine.start_tracking("collar-1");
        engine.set_region("collar-1", square());
        engine.ingest_fix("collar-1", fix(0.005, 0.005, 0)).unwrap();

        let mut editor = PolygonEditor::new();
        editor.start();
        editor.add_vertex(GeoPoint::new(1.0, 1.0)).unwrap();
        editor.add_vertex(GeoPoint::new(1.0, 1.01)).unwrap();

        // Two vertices: nothing persisted, old region kept
        assert!(engine.commit_editor("collar-1", &mut editor).is_err());
        assert!(log.regions().is_empty());
        assert_eq!(engine.region("collar-1"), Some(&square()));

        editor.add_vertex(GeoPoint::new(1.01, 1.01)).unwrap();
        engine.commit_editor("collar-1", &mut editor).unwrap();

        let saved = log.regions();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].0, "collar-1");
        assert_eq!(saved[0].1.len(), 3);

        // Device is outside the new region, but the first evaluation is a baseline
        let report = engine.ingest_fix("collar-1", fix(0.005, 0.005, 1)).unwrap();
        assert_eq!(report.alert, None);
        assert_eq!(report.containment, ContainmentState::Outside);
        assert!(log.alerts().is_empty());
    }

    #[test]
    fn test_flush_route_keeps_session_running() {
        let log = MemoryLog::new();
        let mut engine = TrackingEngine::new().with_route_store(log.clone());
        engine.start_tracking("collar-1");
        engine.ingest_fix("collar-1", fix(0.0, 0.0, 0)).unwrap();

        let record = engine.flush_route("collar-1").unwrap();
        assert_eq!(record.points.len(), 1);
        assert!(engine.is_tracking("collar-1"));
        assert_eq!(log.routes().len(), 1);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = TrackerConfig {
            move_threshold_raw_meters: -1.0,
            ..TrackerConfig::default()
        };
        assert!(matches!(
            TrackingEngine::with_config(config),
            Err(TrackerError::InvalidConfig(_))
        ));
    }
}
