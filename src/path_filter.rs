//! # Path Filter and Distance Accumulator
//!
//! Turns a stream of jittery GPS fixes into two paths:
//!
//! - the **raw path**, used for distance accounting, which only grows when
//!   a fix is at least `move_threshold_raw_meters` from the last raw point;
//! - the **display path**, used for rendering, with its own (usually
//!   smaller) threshold measured from the last display point.
//!
//! The two cursors are independent: a fix can be drawn without being
//! counted as movement, and vice versa.
//!
//! A fix rejected by the raw threshold is dropped from accounting entirely.
//! Callers that need every fix must capture it before handing it over.

use log::debug;

use crate::error::{Result, TrackerError};
use crate::geo_utils::distance_meters;
use crate::{Fix, GeoPoint};

/// What [`PathFilter::append_fix`] did with a fix.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AppendOutcome {
    pub accepted_to_raw: bool,
    pub accepted_to_display: bool,
    /// Distance from the previous raw point when the fix extended the raw
    /// path. `None` for the seed fix and for rejected fixes.
    pub raw_step_meters: Option<f64>,
}

/// Two-cursor GPS noise filter.
#[derive(Debug, Clone)]
pub struct PathFilter {
    move_threshold_raw: f64,
    move_threshold_display: f64,
    raw_path: Vec<Fix>,
    display_path: Vec<GeoPoint>,
}

impl PathFilter {
    /// Create an empty filter with the given thresholds (meters).
    pub fn new(move_threshold_raw: f64, move_threshold_display: f64) -> Self {
        Self {
            move_threshold_raw,
            move_threshold_display,
            raw_path: Vec::new(),
            display_path: Vec::new(),
        }
    }

    /// Offer a fix to both paths.
    ///
    /// The first fix seeds both paths unconditionally. Afterwards each path
    /// accepts the fix only if it lies at least its threshold away from that
    /// path's last point. Out-of-range coordinates are rejected with
    /// [`TrackerError::InvalidCoordinate`] and change nothing.
    pub fn append_fix(&mut self, fix: Fix) -> Result<AppendOutcome> {
        if !fix.point.is_valid() {
            return Err(TrackerError::invalid_coordinate(fix.point.latitude, fix.point.longitude));
        }

        let (last_raw, last_display) = match (self.raw_path.last(), self.display_path.last()) {
            (Some(raw), Some(display)) => (raw.point, *display),
            _ => {
                self.raw_path.push(fix);
                self.display_path.push(fix.point);
                return Ok(AppendOutcome {
                    accepted_to_raw: true,
                    accepted_to_display: true,
                    raw_step_meters: None,
                });
            }
        };

        let step = distance_meters(&last_raw, &fix.point);
        let accepted_to_raw = step >= self.move_threshold_raw;
        if accepted_to_raw {
            self.raw_path.push(fix);
        }

        let display_step = distance_meters(&last_display, &fix.point);
        let accepted_to_display = display_step >= self.move_threshold_display;
        if accepted_to_display {
            self.display_path.push(fix.point);
        }

        debug!(
            "fix @{} step={:.1}m raw={} display_step={:.1}m display={}",
            fix.timestamp, step, accepted_to_raw, display_step, accepted_to_display
        );

        Ok(AppendOutcome {
            accepted_to_raw,
            accepted_to_display,
            raw_step_meters: accepted_to_raw.then_some(step),
        })
    }

    pub fn raw_path(&self) -> &[Fix] {
        &self.raw_path
    }

    pub fn display_path(&self) -> &[GeoPoint] {
        &self.display_path
    }

    pub fn is_empty(&self) -> bool {
        self.raw_path.is_empty()
    }
}

/// Running total of real movement, in unrounded meters.
///
/// Only raw-path steps are counted, so jitter below the raw threshold never
/// inflates the total. The value never decreases.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DistanceAccumulator {
    total_meters: f64,
}

impl DistanceAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the raw step from an append outcome, if there is one.
    pub fn record(&mut self, outcome: &AppendOutcome) {
        if let Some(step) = outcome.raw_step_meters {
            self.total_meters += step;
        }
    }

    pub fn total_meters(&self) -> f64 {
        self.total_meters
    }
}
