//! services/api/src/web/poller.rs
//!
//! The background loop that keeps video statuses moving without a client asking.

use course_workflow_core::WorkflowOrchestrator;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Syncs every session with a rendering video once per `interval`, until `shutdown` fires.
pub async fn run_video_poller(
    orchestrator: WorkflowOrchestrator,
    interval: Duration,
    shutdown: CancellationToken,
) {
    info!("Video status poller started (every {:?}).", interval);
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match orchestrator.sync_all_pending_videos().await {
            Ok(report) if report.checked == 0 => debug!("No pending videos."),
            Ok(report) => info!(
                checked = report.checked,
                completed = report.completed,
                failed = report.failed,
                still_rendering = report.still_rendering,
                poll_errors = report.poll_errors,
                "Video sync pass finished."
            ),
            Err(e) => error!("Video sync pass failed: {}", e),
        }
    }
    info!("Video status poller stopped.");
}

/// Waits for the poller task to end. Returns `false` when it panicked or was aborted.
pub async fn join_video_poller(handle: JoinHandle<()>) -> bool {
    match handle.await {
        Ok(()) => true,
        Err(e) => {
            error!("Video status poller ended abnormally: {}", e);
            false
        }
    }
}
