//! # Tracking Session
//!
//! Per-device tracking state: the filtered paths, the accumulated distance
//! and the geofence containment baseline. One session per tracked device;
//! nothing in here is shared between sessions.

use crate::alerts::RouteRecord;
use crate::error::Result;
use crate::geofence::{self, ContainmentState, Evaluation, GeofenceRegion};
use crate::geo_utils::{compute_bounds, compute_center};
use crate::path_filter::{AppendOutcome, DistanceAccumulator, PathFilter};
use crate::{Fix, GeoPoint, TrackerConfig};

/// Tracking state for one device.
#[derive(Debug, Clone)]
pub struct TrackingSession {
    session_id: u64,
    device_id: String,
    config: TrackerConfig,
    filter: PathFilter,
    distance: DistanceAccumulator,
    containment: ContainmentState,
}

impl TrackingSession {
    /// Start an empty session. Thresholds come from `config` so concurrent
    /// sessions can run with different settings.
    pub fn new(session_id: u64, device_id: impl Into<String>, config: TrackerConfig) -> Self {
        Self {
            session_id,
            device_id: device_id.into(),
            filter: PathFilter::new(
                config.move_threshold_raw_meters,
                config.move_threshold_display_meters,
            ),
            distance: DistanceAccumulator::new(),
            containment: ContainmentState::Unknown,
            config,
        }
    }

    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Feed one fix through the path filter and distance accumulator.
    pub fn append_fix(&mut self, fix: Fix) -> Result<AppendOutcome> {
        let outcome = self.filter.append_fix(fix)?;
        self.distance.record(&outcome);
        Ok(outcome)
    }

    /// Evaluate a point against the device's region and store the new
    /// containment state.
    pub fn evaluate_containment(
        &mut self,
        point: &GeoPoint,
        region: &GeofenceRegion,
    ) -> Evaluation {
        let evaluation = geofence::evaluate(point, region, self.containment);
        self.containment = evaluation.state;
        evaluation
    }

    /// Forget the containment baseline, e.g. after the region is redrawn.
    pub fn reset_containment(&mut self) {
        self.containment = ContainmentState::Unknown;
    }

    pub fn containment(&self) -> ContainmentState {
        self.containment
    }

    pub fn raw_path(&self) -> &[Fix] {
        self.filter.raw_path()
    }

    pub fn display_path(&self) -> &[GeoPoint] {
        self.filter.display_path()
    }

    pub fn accumulated_distance_meters(&self) -> f64 {
        self.distance.total_meters()
    }

    /// Snapshot the display path and distance for persistence.
    pub fn route_record(&self) -> RouteRecord {
        let points = self.display_path().to_vec();
        let raw = self.raw_path();
        RouteRecord {
            session_id: self.session_id,
            device_id: self.device_id.clone(),
            bounds: compute_bounds(&points),
            center: compute_center(&points),
            points,
            distance_meters: self.accumulated_distance_meters(),
            started_at: raw.first().map(|f| f.timestamp),
            last_fix_at: raw.last().map(|f| f.timestamp),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fix(lat: f64, lng: f64, ts: i64) -> Fix {
        Fix::new(GeoPoint::new(lat, lng), ts)
    }

    #[test]
    fn test_session_accumulates_distance() {
        let mut session = TrackingSession::new(1, "collar-1", TrackerConfig::default());
        for (i, lng) in [0.0, 0.001, 0.002].into_iter().enumerate() {
            session.append_fix(fix(0.0, lng, i as i64 * 5_000)).unwrap();
        }
        assert_eq!(session.raw_path().len(), 3);
        assert!((session.accumulated_distance_meters() - 222.4).abs() < 1.0);
    }

    #[test]
    fn test_route_record() {
        let mut session = TrackingSession::new(7, "collar-1", TrackerConfig::default());
        session.append_fix(fix(0.0, 0.0, 1_000)).unwrap();
        session.append_fix(fix(0.0, 0.001, 6_000)).unwrap();

        let record = session.route_record();
        assert_eq!(record.session_id, 7);
        assert_eq!(record.points.len(), 2);
        assert_eq!(record.started_at, Some(1_000));
        assert_eq!(record.last_fix_at, Some(6_000));
        assert!((record.center.unwrap().longitude - 0.0005).abs() < 1e-9);
        assert!(record.distance_meters > 100.0);

        let empty = TrackingSession::new(8, "collar-2", TrackerConfig::default()).route_record();
        assert!(empty.bounds.is_none());
        assert!(empty.center.is_none());
    }
}
