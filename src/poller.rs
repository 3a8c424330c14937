//! Per-device poll timers for the location relay.
//!
//! Each tracked device gets its own timer task. Every tick fetches one fix
//! and feeds it to the shared engine under the session id the timer was
//! started for. Stopping cancels the timer immediately, including a fetch
//! that is still in flight, and the session-id check in
//! [`TrackingEngine::ingest_poll`] rejects anything that slips past.
//!
//! Dropping a [`PollHandle`] without calling `stop` also ends the task.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::alerts::RouteRecord;
use crate::engine::TrackingEngine;
use crate::error::TrackerError;
use crate::http::RelayClient;
use crate::Fix;

/// Engine shared between poll tasks and the host.
pub type SharedEngine = Arc<Mutex<TrackingEngine>>;

/// Anything that can produce the latest fix for a device code.
///
/// `None` means no usable fix this tick.
pub trait FixSource: Send + Sync + 'static {
    fn fetch_fix(&self, device_code: &str) -> impl Future<Output = Option<Fix>> + Send;
}

impl FixSource for RelayClient {
    fn fetch_fix(&self, device_code: &str) -> impl Future<Output = Option<Fix>> + Send {
        RelayClient::fetch_fix(self, device_code)
    }
}

/// Handle to a running poll timer.
#[derive(Debug)]
pub struct PollHandle {
    device_id: String,
    session_id: u64,
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PollHandle {
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancel the timer and wait for the task to exit. No fix is applied
    /// once this returns.
    pub async fn stop(self) {
        // Err only means the task already exited
        let _ = self.cancel.send(true);
        if let Err(e) = self.task.await {
            warn!("Poll task for {} ended abnormally: {}", self.device_id, e);
        }
    }
}

/// Start a fresh session for `device_id` and poll `source` for it at the
/// engine's configured interval.
pub async fn start_polling<S: FixSource>(
    engine: SharedEngine,
    source: Arc<S>,
    device_id: &str,
    device_code: &str,
) -> PollHandle {
    let (session_id, interval) = {
        let mut guard = engine.lock().await;
        let interval = Duration::from_millis(guard.config().poll_interval_ms.max(1));
        (guard.start_tracking(device_id), interval)
    };
    info!("Polling {} every {:?} for session {}", device_id, interval, session_id);

    let (cancel, cancel_rx) = watch::channel(false);
    let task = tokio::spawn(poll_loop(
        engine,
        source,
        device_id.to_string(),
        device_code.to_string(),
        session_id,
        interval,
        cancel_rx,
    ));

    PollHandle {
        device_id: device_id.to_string(),
        session_id,
        cancel,
        task,
    }
}

/// Cancel a poll timer, then stop its session and return the final route.
///
/// If the device was restarted under a newer session in the meantime, that
/// session is left running and `None` is returned.
pub async fn stop_polling(engine: &SharedEngine, handle: PollHandle) -> Option<RouteRecord> {
    let device_id = handle.device_id.clone();
    let session_id = handle.session_id;
    handle.stop().await;

    let mut guard = engine.lock().await;
    if guard.session(&device_id).map(|s| s.session_id()) != Some(session_id) {
        return None;
    }
    guard.stop_tracking(&device_id)
}

async fn poll_loop<S: FixSource>(
    engine: SharedEngine,
    source: Arc<S>,
    device_id: String,
    device_code: String,
    session_id: u64,
    interval: Duration,
    mut cancel: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.changed() => break,
            _ = ticker.tick() => {}
        }

        let fix = tokio::select! {
            biased;
            _ = cancel.changed() => break,
            fix = source.fetch_fix(&device_code) => fix,
        };

        let mut guard = engine.lock().await;
        if *cancel.borrow() {
            break;
        }

        match guard.ingest_poll(&device_id, session_id, fix) {
            Ok(Some(report)) => debug!(
                "[Poll {}] raw={} display={} total={:.0}m",
                device_id,
                report.outcome.accepted_to_raw,
                report.outcome.accepted_to_display,
                report.accumulated_distance_meters
            ),
            Ok(None) => {}
            Err(TrackerError::SessionEnded { .. }) => {
                info!("[Poll {}] Session {} ended, stopping timer", device_id, session_id);
                break;
            }
            Err(e) => warn!("[Poll {}] Fix dropped: {}", device_id, e),
        }
    }

    debug!("[Poll {}] Timer stopped", device_id);
}
