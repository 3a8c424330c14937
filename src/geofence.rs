//! # Geofence Containment
//!
//! Containment predicates (ray-cast polygon, center + radius circle) and the
//! edge-triggered state machine that turns successive containment results
//! into enter/exit events.
//!
//! ```text
//! Unknown --(any)--> Inside | Outside      no event (baseline)
//! Outside --inside-> Inside                Enter
//! Inside  --outside> Outside               Exit
//! Inside  --inside-> Inside                no event
//! Outside --outside> Outside               no event
//! ```
//!
//! Both predicates drive the same state machine, so a device's alerts behave
//! identically whichever region shape the owner drew.

use geo::{Centroid, Coord, LineString, Polygon};

use crate::error::{Result, TrackerError};
use crate::geo_utils::{distance_meters, EARTH_RADIUS_METERS};
use crate::{Bounds, GeoPoint};

/// Minimum vertices for a polygon to enclose an area.
pub const MIN_POLYGON_VERTICES: usize = 3;

// ============================================================================
// State Machine Types
// ============================================================================

/// Whether a device is inside its geofence.
///
/// `Unknown` until the first fix is evaluated against a finalized region;
/// it is never confused with `Outside`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ContainmentState {
    #[default]
    Unknown,
    Inside,
    Outside,
}

impl ContainmentState {
    pub fn from_inside(inside: bool) -> Self {
        if inside {
            ContainmentState::Inside
        } else {
            ContainmentState::Outside
        }
    }

    /// `None` while no baseline has been established.
    pub fn is_inside(&self) -> Option<bool> {
        match self {
            ContainmentState::Unknown => None,
            ContainmentState::Inside => Some(true),
            ContainmentState::Outside => Some(false),
        }
    }
}

/// Boundary crossing detected by [`evaluate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GeofenceEvent {
    Enter,
    Exit,
}

/// Result of one containment evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    /// Always `Inside` or `Outside`; the caller stores it as the next prior state.
    pub state: ContainmentState,
    pub event: Option<GeofenceEvent>,
}

// ============================================================================
// Regions
// ============================================================================

/// Shape of a finalized geofence.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GeofenceShape {
    /// Boundary in drawing order; self-intersections are accepted as drawn.
    Polygon { vertices: Vec<GeoPoint> },
    Circle { center: GeoPoint, radius_meters: f64 },
}

/// A finalized geofence region.
///
/// Construction validates the shape, so every `GeofenceRegion` can take part
/// in containment checks. In-progress drawings live in
/// [`PolygonEditor`](crate::editor::PolygonEditor) and never reach this type.
/// Regions are replaced outright, never edited in place.
///
/// Serialized as its [`GeofenceShape`] alone. Deserializing re-runs the
/// constructor checks and recomputes the bounds.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "GeofenceShape", into = "GeofenceShape"))]
pub struct GeofenceRegion {
    shape: GeofenceShape,
    bounds: Bounds,
}

impl GeofenceRegion {
    /// Finalize a polygon region from at least three valid vertices.
    pub fn polygon(vertices: Vec<GeoPoint>) -> Result<Self> {
        if vertices.len() < MIN_POLYGON_VERTICES {
            return Err(TrackerError::InsufficientVertices { count: vertices.len() });
        }
        if let Some(bad) = vertices.iter().find(|v| !v.is_valid()) {
            return Err(TrackerError::invalid_coordinate(bad.latitude, bad.longitude));
        }
        let bounds = Bounds::from_points(&vertices)
            .ok_or(TrackerError::InsufficientVertices { count: 0 })?;

        Ok(Self {
            shape: GeofenceShape::Polygon { vertices },
            bounds,
        })
    }

    /// Finalize a circular region.
    pub fn circle(center: GeoPoint, radius_meters: f64) -> Result<Self> {
        if !center.is_valid() {
            return Err(TrackerError::invalid_coordinate(center.latitude, center.longitude));
        }
        if !radius_meters.is_finite() || radius_meters <= 0.0 {
            return Err(TrackerError::InvalidRadius(radius_meters));
        }

        let lat_span = (radius_meters / EARTH_RADIUS_METERS).to_degrees();
        let lng_span = lat_span / center.latitude.to_radians().cos().max(1e-6);
        let bounds = Bounds {
            min_lat: center.latitude - lat_span,
            max_lat: center.latitude + lat_span,
            min_lng: center.longitude - lng_span,
            max_lng: center.longitude + lng_span,
        };

        Ok(Self {
            shape: GeofenceShape::Circle { center, radius_meters },
            bounds,
        })
    }

    /// Rebuild a region from a shape, re-validating it.
    pub fn from_shape(shape: GeofenceShape) -> Result<Self> {
        match shape {
            GeofenceShape::Polygon { vertices } => Self::polygon(vertices),
            GeofenceShape::Circle { center, radius_meters } => Self::circle(center, radius_meters),
        }
    }

    pub fn shape(&self) -> &GeofenceShape {
        &self.shape
    }

    /// Polygon vertices; empty for circular regions.
    pub fn vertices(&self) -> &[GeoPoint] {
        match &self.shape {
            GeofenceShape::Polygon { vertices } => vertices,
            GeofenceShape::Circle { .. } => &[],
        }
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Containment predicate for this region's shape.
    pub fn contains(&self, point: &GeoPoint) -> bool {
        match &self.shape {
            GeofenceShape::Polygon { vertices } => {
                self.bounds.contains(point) && ray_cast(point, vertices)
            }
            GeofenceShape::Circle { center, radius_meters } => {
                within_radius(point, center, *radius_meters)
            }
        }
    }

    /// Reference center: the circle center, or the polygon's area centroid.
    ///
    /// Falls back to the bounds center when no centroid can be computed.
    pub fn center(&self) -> GeoPoint {
        match &self.shape {
            GeofenceShape::Circle { center, .. } => *center,
            GeofenceShape::Polygon { vertices } => to_polygon(vertices)
                .centroid()
                .map(|c| GeoPoint::new(c.y(), c.x()))
                .unwrap_or_else(|| self.bounds.center()),
        }
    }

    pub fn distance_from_center(&self, point: &GeoPoint) -> f64 {
        distance_meters(&self.center(), point)
    }

    /// Distance from the point to the nearest part of the boundary, in meters.
    pub fn distance_from_boundary(&self, point: &GeoPoint) -> f64 {
        match &self.shape {
            GeofenceShape::Circle { center, radius_meters } => {
                (distance_meters(center, point) - radius_meters).abs()
            }
            GeofenceShape::Polygon { vertices } => {
                let n = vertices.len();
                (0..n)
                    .map(|i| segment_distance(point, &vertices[i], &vertices[(i + 1) % n]))
                    .fold(f64::INFINITY, f64::min)
            }
        }
    }
}

impl TryFrom<GeofenceShape> for GeofenceRegion {
    type Error = TrackerError;

    fn try_from(shape: GeofenceShape) -> Result<Self> {
        Self::from_shape(shape)
    }
}

impl From<GeofenceRegion> for GeofenceShape {
    fn from(region: GeofenceRegion) -> Self {
        region.shape
    }
}

// ============================================================================
// Containment Predicates
// ============================================================================

/// Ray-casting point-in-polygon test (even-odd rule).
///
/// Casts a ray east from the point (longitude as x, latitude as y) and
/// counts edge crossings; an odd count means inside. Fails with
/// [`TrackerError::InsufficientVertices`] for fewer than three vertices.
///
/// # Example
///
/// ```rust
/// use pet_tracker_core::{GeoPoint, geofence::point_in_polygon};
///
/// let square = [
///     GeoPoint::new(0.0, 0.0),
///     GeoPoint::new(0.0, 0.01),
///     GeoPoint::new(0.01, 0.01),
///     GeoPoint::new(0.01, 0.0),
/// ];
/// assert!(point_in_polygon(&GeoPoint::new(0.005, 0.005), &square).unwrap());
/// assert!(!point_in_polygon(&GeoPoint::new(0.02, 0.02), &square).unwrap());
/// ```
pub fn point_in_polygon(point: &GeoPoint, vertices: &[GeoPoint]) -> Result<bool> {
    if vertices.len() < MIN_POLYGON_VERTICES {
        return Err(TrackerError::InsufficientVertices { count: vertices.len() });
    }
    Ok(ray_cast(point, vertices))
}

fn ray_cast(point: &GeoPoint, vertices: &[GeoPoint]) -> bool {
    let (x, y) = (point.longitude, point.latitude);
    let mut inside = false;
    let mut j = vertices.len() - 1;

    for i in 0..vertices.len() {
        let (xi, yi) = (vertices[i].longitude, vertices[i].latitude);
        let (xj, yj) = (vertices[j].longitude, vertices[j].latitude);

        // (yi > y) != (yj > y) also rules out horizontal edges, so no divide by zero
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }

    inside
}

/// Circle containment: inside when the great-circle distance to the center
/// is at most the radius.
pub fn within_radius(point: &GeoPoint, center: &GeoPoint, radius_meters: f64) -> bool {
    distance_meters(point, center) <= radius_meters
}

// ============================================================================
// Transitions
// ============================================================================

/// Apply one containment result to the prior state.
///
/// Shared by every predicate: an `Unknown` prior only establishes the
/// baseline; afterwards only a change of side produces an event.
pub fn transition(prior: ContainmentState, inside: bool) -> Evaluation {
    let state = ContainmentState::from_inside(inside);
    let event = match (prior, state) {
        (ContainmentState::Outside, ContainmentState::Inside) => Some(GeofenceEvent::Enter),
        (ContainmentState::Inside, ContainmentState::Outside) => Some(GeofenceEvent::Exit),
        _ => None,
    };
    Evaluation { state, event }
}

/// Evaluate a point against a finalized region. Pure: the caller stores
/// `state` as the next prior and dispatches `event` once.
pub fn evaluate(point: &GeoPoint, region: &GeofenceRegion, prior: ContainmentState) -> Evaluation {
    transition(prior, region.contains(point))
}

// ============================================================================
// Helpers
// ============================================================================

fn to_polygon(vertices: &[GeoPoint]) -> Polygon<f64> {
    let coords: Vec<Coord<f64>> = vertices
        .iter()
        .map(|v| Coord { x: v.longitude, y: v.latitude })
        .collect();
    Polygon::new(LineString::new(coords), vec![])
}

/// Distance in meters from `p` to segment `ab`, on a local equirectangular
/// projection centered at `p`. Accurate at geofence scale.
fn segment_distance(p: &GeoPoint, a: &GeoPoint, b: &GeoPoint) -> f64 {
    let meters_per_deg = EARTH_RADIUS_METERS.to_radians();
    let lng_scale = p.latitude.to_radians().cos();
    let project = |q: &GeoPoint| {
        (
            (q.longitude - p.longitude) * lng_scale * meters_per_deg,
            (q.latitude - p.latitude) * meters_per_deg,
        )
    };

    let (ax, ay) = project(a);
    let (bx, by) = project(b);
    let (dx, dy) = (bx - ax, by - ay);
    let len_sq = dx * dx + dy * dy;

    let t = if len_sq > 0.0 {
        (-(ax * dx + ay * dy) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let (cx, cy) = (ax + t * dx, ay + t * dy);
    (cx * cx + cy * cy).sqrt()
}


#[cfg(all(test, feature = "serde"))]
mod serde_tests {
    use super::*;

    #[test]
    fn test_region_serializes_as_shape() {
        let region = GeofenceRegion::circle(GeoPoint::new(1.0, 2.0), 25.0).unwrap();
        let json = serde_json::to_value(&region).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "Circle": {
                    "center": { "latitude": 1.0, "longitude": 2.0 },
                    "radius_meters": 25.0
                }
            })
        );

        let back: GeofenceRegion = serde_json::from_value(json).unwrap();
        assert_eq!(back, region);
    }

    #[test]
    fn test_deserialize_rejects_unfinished_polygons() {
        let empty = r#"{"Polygon":{"vertices":[]}}"#;
        assert!(serde_json::from_str::<GeofenceRegion>(empty).is_err());

        let two = r#"{"Polygon":{"vertices":[
            {"latitude":0.0,"longitude":0.0},
            {"latitude":0.0,"longitude":0.01}
        ]}}"#;
        let err = serde_json::from_str::<GeofenceRegion>(two).unwrap_err();
        assert!(err.to_string().contains("got 2"));

        let bad_radius = r#"{"Circle":{
            "center":{"latitude":0.0,"longitude":0.0},
            "radius_meters":-5.0
        }}"#;
        assert!(serde_json::from_str::<GeofenceRegion>(bad_radius).is_err());
    }

    #[test]
    fn test_deserialize_recomputes_bounds() {
        let json = r#"{"Polygon":{"vertices":[
            {"latitude":0.0,"longitude":0.0},
            {"latitude":0.0,"longitude":0.01},
            {"latitude":0.01,"longitude":0.01},
            {"latitude":0.01,"longitude":0.0}
        ]}}"#;
        let region: GeofenceRegion = serde_json::from_str(json).unwrap();
        assert_eq!(region.bounds().max_lat, 0.01);
        assert_eq!(region.bounds().max_lng, 0.01);
        assert!(region.contains(&GeoPoint::new(0.005, 0.005)));

        // Bounds are never read from input
        let legacy = r#"{"shape":{"Polygon":{"vertices":[]}},"bounds":
            {"min_lat":-1.0,"max_lat":1.0,"min_lng":-1.0,"max_lng":1.0}}"#;
        assert!(serde_json::from_str::<GeofenceRegion>(legacy).is_err());
    }
}
