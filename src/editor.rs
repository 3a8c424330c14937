//! # Polygon Editor
//!
//! Accumulates geofence vertices from user taps and hands over a finalized
//! [`GeofenceRegion`] once the drawing encloses an area.
//!
//! ```text
//! Idle ──start──▶ Drawing ──finalize (≥3 vertices)──▶ Finalized
//!                  │  ▲                                   │
//!      add / undo  └──┘        cancel ──▶ Idle ◀── discard ┘
//! ```
//!
//! Destructive confirmation for `cancel` is the UI's job; the editor simply
//! discards whatever was drawn.

use log::{debug, warn};

use crate::error::{Result, TrackerError};
use crate::geofence::{GeofenceRegion, MIN_POLYGON_VERTICES};
use crate::GeoPoint;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum EditorState {
    #[default]
    Idle,
    Drawing,
    Finalized,
}

/// Interactive polygon builder.
#[derive(Debug, Clone, Default)]
pub struct PolygonEditor {
    state: EditorState,
    vertices: Vec<GeoPoint>,
}

impl PolygonEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> EditorState {
        self.state
    }

    /// Vertices drawn so far, in boundary order.
    pub fn vertices(&self) -> &[GeoPoint] {
        &self.vertices
    }

    pub fn can_finalize(&self) -> bool {
        self.state == EditorState::Drawing && self.vertices.len() >= MIN_POLYGON_VERTICES
    }

    /// Begin a new drawing, clearing any previous vertices.
    pub fn start(&mut self) {
        self.vertices.clear();
        self.state = EditorState::Drawing;
    }

    /// Append a tapped vertex and return the new vertex count.
    ///
    /// Out-of-range coordinates are rejected and leave the drawing unchanged.
    pub fn add_vertex(&mut self, point: GeoPoint) -> Result<usize> {
        if self.state != EditorState::Drawing {
            return Err(TrackerError::NotDrawing);
        }
        if !point.is_valid() {
            warn!("Rejected geofence vertex ({}, {})", point.latitude, point.longitude);
            return Err(TrackerError::invalid_coordinate(point.latitude, point.longitude));
        }

        self.vertices.push(point);
        Ok(self.vertices.len())
    }

    /// Remove the most recent vertex. Undo with nothing drawn is a no-op.
    pub fn undo(&mut self) -> Option<GeoPoint> {
        if self.state != EditorState::Drawing {
            return None;
        }
        self.vertices.pop()
    }

    /// Abandon the drawing and return to `Idle`. Returns how many vertices
    /// were discarded.
    pub fn cancel(&mut self) -> usize {
        if self.state != EditorState::Drawing {
            return 0;
        }
        let discarded = self.vertices.len();
        self.vertices.clear();
        self.state = EditorState::Idle;
        discarded
    }

    /// Close the drawing into a region.
    ///
    /// With fewer than three vertices this fails with
    /// [`TrackerError::InsufficientVertices`] and the editor keeps drawing.
    /// Collinear vertices are accepted.
    pub fn finalize(&mut self) -> Result<GeofenceRegion> {
        if self.state != EditorState::Drawing {
            return Err(TrackerError::NotDrawing);
        }

        let region = GeofenceRegion::polygon(self.vertices.clone())?;
        self.state = EditorState::Finalized;
        debug!("Finalized geofence with {} vertices", self.vertices.len());
        Ok(region)
    }

    /// Drop a finalized drawing so a new one can be started from `Idle`.
    pub fn discard(&mut self) {
        if self.state == EditorState::Finalized {
            self.vertices.clear();
            self.state = EditorState::Idle;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drawing(points: &[(f64, f64)]) -> PolygonEditor {
        let mut editor = PolygonEditor::new();
        editor.start();
        for &(lat, lng) in points {
            editor.add_vertex(GeoPoint::new(lat, lng)).unwrap();
        }
        editor
    }

    #[test]
    fn test_finalize_needs_three_vertices() {
        let mut editor = drawing(&[(0.0, 0.0), (0.0, 0.01)]);
        assert_eq!(
            editor.finalize().unwrap_err(),
            TrackerError::InsufficientVertices { count: 2 }
        );
        assert_eq!(editor.state(), EditorState::Drawing);
        assert_eq!(editor.vertices().len(), 2);
    }

    #[test]
    fn test_finalize_collinear_vertices() {
        let mut editor = drawing(&[(0.0, 0.0), (0.0, 0.01), (0.0, 0.02)]);
        assert!(editor.can_finalize());
        let region = editor.finalize().unwrap();
        assert_eq!(region.vertices().len(), 3);
        assert_eq!(editor.state(), EditorState::Finalized);
    }

    #[test]
    fn test_undo_on_empty_is_noop() {
        let mut editor = drawing(&[]);
        assert_eq!(editor.undo(), None);
        assert!(editor.vertices().is_empty());
        assert_eq!(editor.state(), EditorState::Drawing);
    }

    #[test]
    fn test_undo_removes_last_vertex() {
        let mut editor = drawing(&[(0.0, 0.0), (0.0, 0.01), (0.01, 0.01)]);
        assert_eq!(editor.undo(), Some(GeoPoint::new(0.01, 0.01)));
        assert_eq!(editor.vertices(), &[GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 0.01)]);
        assert!(!editor.can_finalize());
    }

    #[test]
    fn test_invalid_vertex_rejected() {
        let mut editor = drawing(&[(0.0, 0.0)]);
        assert!(matches!(
            editor.add_vertex(GeoPoint::new(-91.0, 0.0)),
            Err(TrackerError::InvalidCoordinate { .. })
        ));
        assert!(editor.add_vertex(GeoPoint::new(0.0, 180.5)).is_err());
        assert_eq!(editor.vertices().len(), 1);
    }

    #[test]
    fn test_cancel_discards_drawing() {
        let mut editor = drawing(&[(0.0, 0.0), (0.0, 0.01)]);
        assert_eq!(editor.cancel(), 2);
        assert_eq!(editor.state(), EditorState::Idle);
        assert!(editor.vertices().is_empty());
        assert_eq!(editor.add_vertex(GeoPoint::new(0.0, 0.0)), Err(TrackerError::NotDrawing));
    }

    #[test]
    fn test_redraw_after_finalize() {
        let mut editor = drawing(&[(0.0, 0.0), (0.0, 0.01), (0.01, 0.01)]);
        editor.finalize().unwrap();

        // Finalized drawings are not edited in place
        assert_eq!(editor.add_vertex(GeoPoint::new(0.01, 0.0)), Err(TrackerError::NotDrawing));
        assert_eq!(editor.undo(), None);

        editor.discard();
        assert_eq!(editor.state(), EditorState::Idle);
        editor.start();
        assert!(editor.vertices().is_empty());
        assert_eq!(editor.state(), EditorState::Drawing);
    }
}
