//! Background expiration sweeper.
//!
//! Periodically asks the pipeline to remove everything past its expiration
//! instant. Each run carries its own time budget, and the task stops
//! cleanly when the shutdown channel fires.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{error, info, warn};

use glimpse_pipeline::MediaPipeline;

/// Spawn the sweeper task.
///
/// The first interval tick completes immediately and is skipped so a sweep
/// does not race server startup. Returns the task handle and the shutdown
/// sender; sending (or dropping) the sender stops the task.
pub fn spawn_sweeper(
    pipeline: Arc<MediaPipeline>,
    period: Duration,
    budget: Duration,
) -> (tokio::task::JoinHandle<()>, mpsc::Sender<()>) {
    let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

    let handle = tokio::spawn(async move {
        info!(period_seconds = period.as_secs(), "expiration sweeper starting");
        let mut timer = interval(period);
        timer.tick().await;

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("expiration sweeper received shutdown signal");
                    break;
                }
                _ = timer.tick() => {
                    match tokio::time::timeout(budget, pipeline.sweep_expired()).await {
                        Ok(Ok(0)) => {}
                        Ok(Ok(removed)) => info!(removed, "expiration sweep removed resources"),
                        Ok(Err(e)) => error!(error = %e, "expiration sweep failed"),
                        Err(_) => warn!(budget_seconds = budget.as_secs(), "expiration sweep exceeded its budget"),
                    }
                }
            }
        }

        info!("expiration sweeper stopped");
    });

    (handle, shutdown_tx)
}
