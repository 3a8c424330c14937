//! # Geographic Utilities
//!
//! Geodesy primitives used by the path filter, distance accumulator and
//! geofence containment checks.
//!
//! ## Overview
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`distance_meters`] | Great-circle distance between two GPS points |
//! | [`compute_bounds`] | Bounding box of a GPS path |
//! | [`compute_center`] | Centroid of a GPS path |
//! | [`format_distance`] | Human-readable distance (m / km) |
//!
//! ## Example
//!
//! ```rust
//! use pet_tracker_core::{GeoPoint, geo_utils};
//!
//! let a = GeoPoint::new(16.4755, 102.8250);
//! let b = GeoPoint::new(16.4755, 102.8350);
//!
//! let d = geo_utils::distance_meters(&a, &b);
//! assert!((d - 1066.0).abs() < 10.0);
//! assert_eq!(geo_utils::format_distance(d), "1.07 km");
//! ```
//!
//! ## Algorithm Notes
//!
//! Distances use the haversine formula on a sphere of radius 6,371,000 m.
//! Inputs are WGS84 degrees; range validation is the caller's job.

use crate::{Bounds, GeoPoint};

/// Mean Earth radius used by [`distance_meters`].
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

// =============================================================================
// Distance Functions
// =============================================================================

/// Great-circle distance between two GPS points using the haversine formula.
///
/// Symmetric, and exactly `0.0` for identical points.
///
/// # Example
///
/// ```rust
/// use pet_tracker_core::{GeoPoint, geo_utils};
///
/// let p = GeoPoint::new(0.0, 0.0);
/// let q = GeoPoint::new(0.0, 0.001);
/// let d = geo_utils::distance_meters(&p, &q);
/// assert!((d - 111.2).abs() < 0.5);
/// ```
#[inline]
pub fn distance_meters(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lng = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    // Rounding can push h a hair past 1.0 for antipodal points
    let c = 2.0 * h.sqrt().min(1.0).asin();
    EARTH_RADIUS_METERS * c
}

// =============================================================================
// Bounding Box / Center Functions
// =============================================================================

/// Bounding box of a GPS path, or `None` for an empty path.
pub fn compute_bounds(points: &[GeoPoint]) -> Option<Bounds> {
    Bounds::from_points(points)
}

/// Arithmetic-mean center of a GPS path. Returns `None` for empty input.
///
/// Adequate for the small areas a pet roams; not meaningful across the
/// antimeridian.
pub fn compute_center(points: &[GeoPoint]) -> Option<GeoPoint> {
    if points.is_empty() {
        return None;
    }

    let sum_lat: f64 = points.iter().map(|p| p.latitude).sum();
    let sum_lng: f64 = points.iter().map(|p| p.longitude).sum();
    let n = points.len() as f64;

    Some(GeoPoint::new(sum_lat / n, sum_lng / n))
}

// =============================================================================
// Presentation
// =============================================================================

/// Format a distance for display: whole meters below 1 km, kilometers with
/// two decimals from 1000 m up.
///
/// Accumulated distances stay unrounded in meters; this is the only place
/// rounding happens.
pub fn format_distance(meters: f64) -> String {
    if meters >= 1000.0 {
        format!("{:.2} km", meters / 1000.0)
    } else {
        format!("{:.0} m", meters)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    #[test]
    fn test_distance_same_point() {
        let p = GeoPoint::new(16.4755, 102.8250);
        assert_eq!(distance_meters(&p, &p), 0.0);
    }

    #[test]
    fn test_distance_symmetric() {
        let pairs = [
            (GeoPoint::new(16.4755, 102.8250), GeoPoint::new(16.4800, 102.8300)),
            (GeoPoint::new(-33.86, 151.21), GeoPoint::new(51.50, -0.12)),
            (GeoPoint::new(0.0, 179.9), GeoPoint::new(0.0, -179.9)),
        ];
        for (a, b) in pairs {
            assert_eq!(distance_meters(&a, &b), distance_meters(&b, &a));
        }
    }

    #[test]
    fn test_distance_known_value() {
        // One hundredth of a degree of longitude at ~16.5N
        let a = GeoPoint::new(16.4755, 102.8250);
        let b = GeoPoint::new(16.4755, 102.8350);
        let d = distance_meters(&a, &b);
        assert!(approx_eq(d, 1061.0, 1061.0 * 0.05), "got {d}");
    }

    #[test]
    fn test_distance_antipodal_is_finite() {
        let a = GeoPoint::new(0.0, 0.0);
        let b = GeoPoint::new(0.0, 180.0);
        let d = distance_meters(&a, &b);
        assert!(approx_eq(d, std::f64::consts::PI * EARTH_RADIUS_METERS, 1.0));
    }

    #[test]
    fn test_compute_bounds_and_center() {
        let track = vec![
            GeoPoint::new(16.47, 102.82),
            GeoPoint::new(16.49, 102.84),
        ];
        let bounds = compute_bounds(&track).unwrap();
        assert_eq!(bounds.min_lat, 16.47);
        assert_eq!(bounds.max_lng, 102.84);

        let center = compute_center(&track).unwrap();
        assert!(approx_eq(center.latitude, 16.48, 1e-9));
        assert!(approx_eq(center.longitude, 102.83, 1e-9));

        assert!(compute_bounds(&[]).is_none());
        assert!(compute_center(&[]).is_none());
    }

    #[test]
    fn test_format_distance() {
        assert_eq!(format_distance(0.0), "0 m");
        assert_eq!(format_distance(999.4), "999 m");
        assert_eq!(format_distance(1000.0), "1.00 km");
        assert_eq!(format_distance(2360.0), "2.36 km");
    }
}
