//! Error types shared by every tracking component.
//!
//! Nothing here is fatal: each variant describes a local, recoverable
//! condition and the operation that produced it leaves prior state intact.

use thiserror::Error;

/// Errors returned by the tracking core.
#[derive(Debug, Clone, PartialEq, Error)]
#[cfg_attr(feature = "ffi", derive(uniffi::Error), uniffi(flat_error))]
pub enum TrackerError {
    /// Latitude outside [-90, 90], longitude outside [-180, 180], or not finite.
    #[error("invalid coordinate ({latitude}, {longitude})")]
    InvalidCoordinate { latitude: f64, longitude: f64 },

    /// A polygon needs at least three vertices to enclose an area.
    #[error("polygon needs at least 3 vertices, got {count}")]
    InsufficientVertices { count: usize },

    /// Vertex edits and finalize are only accepted while drawing.
    #[error("polygon editor is not drawing")]
    NotDrawing,

    #[error("invalid geofence radius {0}m")]
    InvalidRadius(f64),

    #[error("device {0} is not being tracked")]
    NotTracking(String),

    /// A fix arrived for a session that has since been stopped or replaced.
    #[error("session {session_id} for device {device_id} has ended")]
    SessionEnded { device_id: String, session_id: u64 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("location relay error: {0}")]
    Relay(String),
}

pub type Result<T> = std::result::Result<T, TrackerError>;

impl TrackerError {
    pub(crate) fn invalid_coordinate(latitude: f64, longitude: f64) -> Self {
        TrackerError::InvalidCoordinate { latitude, longitude }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = TrackerError::InsufficientVertices { count: 2 };
        assert_eq!(err.to_string(), "polygon needs at least 3 vertices, got 2");

        let err = TrackerError::SessionEnded { device_id: "collar-7".into(), session_id: 3 };
        assert_eq!(err.to_string(), "session 3 for device collar-7 has ended");
    }
}
