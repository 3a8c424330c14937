//! # Pet Tracker Core
//!
//! GPS movement tracking and geofence alerts for pet trackers.
//!
//! This library provides:
//! - Noise filtering of raw GPS fixes into a display path and a raw path
//! - Movement distance that ignores stationary GPS jitter
//! - Polygon and circle geofences with edge-triggered enter/exit alerts
//! - An interactive polygon editor for drawing geofences
//! - A per-device engine so several pets can be tracked at once
//!
//! ## Features
//!
//! - **`serde`** - Derive Serialize/Deserialize on data types
//! - **`parallel`** - Enable parallel history replay with rayon
//! - **`http`** - Enable the location relay client and poll timers
//! - **`ffi`** - Enable FFI bindings for mobile platforms (iOS/Android)
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use pet_tracker_core::{Fix, GeoPoint, GeofenceEvent, GeofenceRegion, TrackingEngine};
//!
//! let mut engine = TrackingEngine::new();
//! engine.start_tracking("collar-1");
//!
//! let yard = GeofenceRegion::polygon(vec![
//!     GeoPoint::new(0.0, 0.0),
//!     GeoPoint::new(0.0, 0.01),
//!     GeoPoint::new(0.01, 0.01),
//!     GeoPoint::new(0.01, 0.0),
//! ]).unwrap();
//! engine.set_region("collar-1", yard);
//!
//! // First fix establishes the baseline, the second leaves the yard
//! engine.ingest_fix("collar-1", Fix::new(GeoPoint::new(0.005, 0.005), 0)).unwrap();
//! let report = engine.ingest_fix("collar-1", Fix::new(GeoPoint::new(0.02, 0.02), 5_000)).unwrap();
//!
//! assert_eq!(report.alert.map(|a| a.kind), Some(GeofenceEvent::Exit));
//! ```

// Unified error handling
pub mod error;
pub use error::{Result, TrackerError};

// Geographic utilities (distance, bounds, center calculations)
pub mod geo_utils;

// Raw/display path filtering and movement distance
pub mod path_filter;
pub use path_filter::{AppendOutcome, DistanceAccumulator, PathFilter};

// Geofence containment and enter/exit transitions
pub mod geofence;
pub use geofence::{
    ContainmentState, Evaluation, GeofenceEvent, GeofenceRegion, GeofenceShape,
    evaluate, point_in_polygon, within_radius,
};

// Interactive polygon drawing
pub mod editor;
pub use editor::{EditorState, PolygonEditor};

// Alert / region / route collaborators
pub mod alerts;
pub use alerts::{AlertEvent, AlertSink, MemoryLog, RegionStore, RouteRecord, RouteStore};

// Per-device tracking state
pub mod session;
pub use session::TrackingSession;

// Stateful multi-device engine
pub mod engine;
pub use engine::{IngestReport, TrackingEngine};

// Route history replay
pub mod history;
pub use history::{RecordedTrack, summarize_track, summarize_tracks};
#[cfg(feature = "parallel")]
pub use history::summarize_tracks_parallel;

// HTTP client and poll timers for the location relay
#[cfg(feature = "http")]
pub mod http;
#[cfg(feature = "http")]
pub use http::{RelayClient, RelayConfig};

#[cfg(feature = "http")]
pub mod poller;
#[cfg(feature = "http")]
pub use poller::{FixSource, PollHandle, SharedEngine, start_polling, stop_polling};

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android (only used in FFI)
#[cfg(all(feature = "ffi", target_os = "android"))]
fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("PetTrackerRust")
    );
}

#[cfg(all(feature = "ffi", not(target_os = "android")))]
fn init_logging() {
    // No-op on non-Android platforms
}

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate with latitude and longitude in degrees.
///
/// # Example
/// ```
/// use pet_tracker_core::GeoPoint;
/// let point = GeoPoint::new(16.4755, 102.8250); // Khon Kaen
/// assert!(point.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// One location report from a tracking device.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Fix {
    pub point: GeoPoint,
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
    /// Horizontal accuracy radius in meters, when the device reports one
    pub accuracy_meters: Option<f64>,
}

impl Fix {
    pub fn new(point: GeoPoint, timestamp: i64) -> Self {
        Self { point, timestamp, accuracy_meters: None }
    }

    pub fn with_accuracy(mut self, accuracy_meters: f64) -> Self {
        self.accuracy_meters = Some(accuracy_meters);
        self
    }
}

/// Bounding box of a path or region.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Create bounds from GPS points.
    pub fn from_points(points: &[GeoPoint]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let mut min_lat = f64::MAX;
        let mut max_lat = f64::MIN;
        let mut min_lng = f64::MAX;
        let mut max_lng = f64::MIN;

        for p in points {
            min_lat = min_lat.min(p.latitude);
            max_lat = max_lat.max(p.latitude);
            min_lng = min_lng.min(p.longitude);
            max_lng = max_lng.max(p.longitude);
        }

        Some(Self { min_lat, max_lat, min_lng, max_lng })
    }

    /// Get the center point of the bounds.
    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }

    /// Inclusive containment check.
    pub fn contains(&self, point: &GeoPoint) -> bool {
        point.latitude >= self.min_lat
            && point.latitude <= self.max_lat
            && point.longitude >= self.min_lng
            && point.longitude <= self.max_lng
    }
}

/// Configuration for tracking sessions.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrackerConfig {
    /// Minimum movement from the last raw point for a fix to count toward
    /// distance. Default: 5.0 meters (above typical stationary GPS jitter)
    pub move_threshold_raw_meters: f64,

    /// Minimum movement from the last drawn point for a fix to be added to
    /// the display path. Default: 3.0 meters
    pub move_threshold_display_meters: f64,

    /// Interval between location relay polls.
    /// Default: 5000 ms
    pub poll_interval_ms: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            move_threshold_raw_meters: 5.0,
            move_threshold_display_meters: 3.0,
            poll_interval_ms: 5_000,
        }
    }
}

impl TrackerConfig {
    /// Reject negative or non-finite thresholds and a zero poll interval.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("move_threshold_raw_meters", self.move_threshold_raw_meters),
            ("move_threshold_display_meters", self.move_threshold_display_meters),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(TrackerError::InvalidConfig(format!(
                    "{name} must be >= 0, got {value}"
                )));
            }
        }
        if self.poll_interval_ms == 0 {
            return Err(TrackerError::InvalidConfig("poll_interval_ms must be > 0".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// FFI Exports (only when feature enabled)
// ============================================================================

#[cfg(feature = "ffi")]
mod ffi {
    use super::*;
    use log::{debug, info};
    use once_cell::sync::Lazy;
    use std::sync::{Arc, Mutex, MutexGuard};

    /// Process-wide engine shared by every exported function.
    static ENGINE: Lazy<Mutex<TrackingEngine>> = Lazy::new(|| Mutex::new(TrackingEngine::new()));

    fn engine() -> MutexGuard<'static, TrackingEngine> {
        ENGINE.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ========================================================================
    // Alert Callback Interface (for real-time notifications to mobile)
    // ========================================================================

    /// Callback interface for receiving geofence alerts.
    /// Implement this in Kotlin/Swift and register it with `tracker_set_alert_callback`.
    #[uniffi::export(callback_interface)]
    pub trait AlertCallback: Send + Sync {
        /// Called once per enter/exit event.
        fn on_alert(&self, event: AlertEvent);
    }

    struct CallbackSink(Box<dyn AlertCallback>);

    impl AlertSink for CallbackSink {
        fn emit(&mut self, event: &AlertEvent) {
            self.0.on_alert(event.clone());
        }
    }

    #[uniffi::export]
    pub fn tracker_set_alert_callback(callback: Box<dyn AlertCallback>) {
        init_logging();
        info!("[PetTrackerRust] Alert callback registered");
        engine().set_alert_sink(Box::new(CallbackSink(callback)));
    }

    // ========================================================================
    // Sessions
    // ========================================================================

    /// Get default configuration.
    #[uniffi::export]
    pub fn default_tracker_config() -> TrackerConfig {
        TrackerConfig::default()
    }

    /// Set the thresholds used by sessions started from now on.
    #[uniffi::export]
    pub fn tracker_configure(config: TrackerConfig) -> std::result::Result<(), TrackerError> {
        init_logging();
        info!("[PetTrackerRust] configure {:?}", config);
        engine().set_config(config)
    }

    #[uniffi::export]
    pub fn tracker_start(device_id: String) -> u64 {
        init_logging();
        engine().start_tracking(&device_id)
    }

    #[uniffi::export]
    pub fn tracker_stop(device_id: String) -> Option<RouteRecord> {
        engine().stop_tracking(&device_id)
    }

    #[uniffi::export]
    pub fn tracker_switch_device(from: String, to: String) -> u64 {
        engine().switch_device(&from, &to)
    }

    #[uniffi::export]
    pub fn tracker_ingest_fix(
        device_id: String,
        fix: Fix,
    ) -> std::result::Result<IngestReport, TrackerError> {
        engine().ingest_fix(&device_id, fix)
    }

    /// Current route without persisting it.
    #[uniffi::export]
    pub fn tracker_route_snapshot(device_id: String) -> Option<RouteRecord> {
        engine().session(&device_id).map(|s| s.route_record())
    }

    #[uniffi::export]
    pub fn tracker_flush_route(device_id: String) -> Option<RouteRecord> {
        engine().flush_route(&device_id)
    }

    #[uniffi::export]
    pub fn tracker_containment(device_id: String) -> ContainmentState {
        engine()
            .session(&device_id)
            .map(|s| s.containment())
            .unwrap_or_default()
    }

    #[uniffi::export]
    pub fn tracker_tracked_devices() -> Vec<String> {
        engine().tracked_devices()
    }

    // ========================================================================
    // Regions
    // ========================================================================

    #[uniffi::export]
    pub fn tracker_set_polygon_region(
        device_id: String,
        vertices: Vec<GeoPoint>,
    ) -> std::result::Result<(), TrackerError> {
        let region = GeofenceRegion::polygon(vertices)?;
        engine().set_region(&device_id, region);
        Ok(())
    }

    #[uniffi::export]
    pub fn tracker_set_circle_region(
        device_id: String,
        center: GeoPoint,
        radius_meters: f64,
    ) -> std::result::Result<(), TrackerError> {
        let region = GeofenceRegion::circle(center, radius_meters)?;
        engine().set_region(&device_id, region);
        Ok(())
    }

    #[uniffi::export]
    pub fn tracker_clear_region(device_id: String) -> bool {
        engine().clear_region(&device_id).is_some()
    }

    #[uniffi::export]
    pub fn tracker_region(device_id: String) -> Option<GeofenceShape> {
        engine().region(&device_id).map(|r| r.shape().clone())
    }

    /// Polygon editor handle for the geofence drawing screen.
    #[derive(uniffi::Object)]
    pub struct GeofenceEditor {
        inner: Mutex<PolygonEditor>,
    }

    impl GeofenceEditor {
        fn editor(&self) -> MutexGuard<'_, PolygonEditor> {
            self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
        }
    }

    #[uniffi::export]
    impl GeofenceEditor {
        #[uniffi::constructor]
        pub fn new() -> Arc<Self> {
            Arc::new(Self { inner: Mutex::new(PolygonEditor::new()) })
        }

        pub fn start(&self) {
            self.editor().start();
        }

        pub fn add_vertex(&self, point: GeoPoint) -> std::result::Result<u32, TrackerError> {
            self.editor().add_vertex(point).map(|n| n as u32)
        }

        pub fn undo(&self) -> Option<GeoPoint> {
            self.editor().undo()
        }

        pub fn cancel(&self) -> u32 {
            self.editor().cancel() as u32
        }

        pub fn discard(&self) {
            self.editor().discard();
        }

        pub fn state(&self) -> EditorState {
            self.editor().state()
        }

        pub fn vertices(&self) -> Vec<GeoPoint> {
            self.editor().vertices().to_vec()
        }

        pub fn can_finalize(&self) -> bool {
            self.editor().can_finalize()
        }

        /// Finalize the drawing and install it as the device's geofence.
        pub fn commit(&self, device_id: String) -> std::result::Result<(), TrackerError> {
            let mut editor = self.editor();
            engine().commit_editor(&device_id, &mut editor)
        }
    }

    // ========================================================================
    // Geodesy / Containment Primitives
    // ========================================================================

    #[uniffi::export]
    pub fn ffi_distance_meters(a: GeoPoint, b: GeoPoint) -> f64 {
        geo_utils::distance_meters(&a, &b)
    }

    #[uniffi::export]
    pub fn ffi_format_distance(meters: f64) -> String {
        geo_utils::format_distance(meters)
    }

    #[uniffi::export]
    pub fn ffi_point_in_polygon(
        point: GeoPoint,
        vertices: Vec<GeoPoint>,
    ) -> std::result::Result<bool, TrackerError> {
        point_in_polygon(&point, &vertices)
    }

    // ========================================================================
    // History
    // ========================================================================

    /// Rebuild route records from stored fix logs.
    #[uniffi::export]
    pub fn ffi_summarize_tracks(
        tracks: Vec<RecordedTrack>,
        config: TrackerConfig,
    ) -> std::result::Result<Vec<RouteRecord>, TrackerError> {
        init_logging();
        info!("[PetTrackerRust] summarize_tracks called with {} tracks", tracks.len());
        let start = std::time::Instant::now();

        let records = summarize_tracks_parallel(&tracks, &config)?;

        info!("[PetTrackerRust] Summarized {} tracks in {:?}", records.len(), start.elapsed());
        Ok(records)
    }

    // ========================================================================
    // Relay Polling (host-owned timer)
    // ========================================================================

    /// A tracked device and the code the relay knows it by.
    #[cfg(feature = "http")]
    #[derive(Debug, Clone, uniffi::Record)]
    pub struct DeviceRef {
        pub device_id: String,
        pub device_code: String,
    }

    /// Run one poll tick for the given devices: fetch from the relay and
    /// ingest whatever arrived. Devices that are not tracked are skipped,
    /// and failed fetches count as "no fix this tick".
    #[cfg(feature = "http")]
    #[uniffi::export]
    pub fn tracker_poll_devices(relay: RelayConfig, devices: Vec<DeviceRef>) -> Vec<IngestReport> {
        use tokio::runtime::Builder;

        init_logging();

        let sessions: Vec<(DeviceRef, u64)> = {
            let engine = engine();
            devices
                .into_iter()
                .filter_map(|d| {
                    let session_id = engine.session(&d.device_id)?.session_id();
                    Some((d, session_id))
                })
                .collect()
        };
        if sessions.is_empty() {
            return Vec::new();
        }

        let rt = match Builder::new_current_thread().enable_all().build() {
            Ok(rt) => rt,
            Err(e) => {
                log::warn!("Failed to create tokio runtime: {}", e);
                return Vec::new();
            }
        };
        let client = match RelayClient::new(relay) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("Failed to create relay client: {}", e);
                return Vec::new();
            }
        };

        let codes: Vec<String> = sessions.iter().map(|(d, _)| d.device_code.clone()).collect();
        let fixes = rt.block_on(client.fetch_fixes(codes));

        let mut engine = engine();
        sessions
            .into_iter()
            .zip(fixes)
            .filter_map(|((device, session_id), fix)| {
                match engine.ingest_poll(&device.device_id, session_id, fix) {
                    Ok(report) => report,
                    Err(e) => {
                        debug!(
                            "[PetTrackerRust] Dropped poll result for {}: {}",
                            device.device_id, e
                        );
                        None
                    }
                }
            })
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
