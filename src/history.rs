//! Route history replay.
//!
//! Stored fix logs are replayed through a fresh [`TrackingSession`] so a
//! history screen shows the same filtered path and distance the live view
//! did. Invalid fixes in a log are skipped rather than failing the replay.

use log::{debug, info};

use crate::alerts::RouteRecord;
use crate::error::Result;
use crate::session::TrackingSession;
use crate::{Fix, TrackerConfig};

/// A stored fix log for one device.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RecordedTrack {
    pub device_id: String,
    /// Fixes in arrival order
    pub fixes: Vec<Fix>,
}

/// Replay one fix log and return its route record.
///
/// History records carry session id 0; they do not belong to a live session.
/// Fails with [`TrackerError::InvalidConfig`](crate::TrackerError::InvalidConfig)
/// when `config` does not validate.
pub fn summarize_track(
    device_id: &str,
    fixes: &[Fix],
    config: &TrackerConfig,
) -> Result<RouteRecord> {
    config.validate()?;
    Ok(replay(device_id, fixes, config))
}

fn replay(device_id: &str, fixes: &[Fix], config: &TrackerConfig) -> RouteRecord {
    let mut session = TrackingSession::new(0, device_id, config.clone());
    let mut skipped = 0usize;

    for fix in fixes {
        if session.append_fix(*fix).is_err() {
            skipped += 1;
        }
    }

    if skipped > 0 {
        debug!("Skipped {} invalid fixes replaying {}", skipped, device_id);
    }

    session.route_record()
}

/// Replay many fix logs sequentially.
pub fn summarize_tracks(
    tracks: &[RecordedTrack],
    config: &TrackerConfig,
) -> Result<Vec<RouteRecord>> {
    config.validate()?;
    info!("Replaying {} tracks", tracks.len());
    Ok(tracks
        .iter()
        .map(|t| replay(&t.device_id, &t.fixes, config))
        .collect())
}

/// Replay many fix logs in parallel. Output order matches input order.
#[cfg(feature = "parallel")]
pub fn summarize_tracks_parallel(
    tracks: &[RecordedTrack],
    config: &TrackerConfig,
) -> Result<Vec<RouteRecord>> {
    use rayon::prelude::*;

    config.validate()?;
    info!("Replaying {} tracks in parallel", tracks.len());
    Ok(tracks
        .par_iter()
        .map(|t| replay(&t.device_id, &t.fixes, config))
        .collect())
}
