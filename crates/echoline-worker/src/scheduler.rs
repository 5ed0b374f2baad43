//! In-process periodic trigger for the orchestrator.
//!
//! One loop per media type, so a slow video batch never delays audio. A loop
//! awaits its batch before waiting for the next tick and missed ticks are
//! skipped, so one loop never overlaps itself. Overlap with externally
//! triggered runs is handled by the claim.
//!
//! Shutdown: [`PipelineScheduler::shutdown`] stops the loops and waits for any
//! batch in progress to finish.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use echoline_core::models::MediaType;

use crate::orchestrator::PipelineOrchestrator;

pub struct PipelineScheduler {
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl PipelineScheduler {
    pub fn start(orchestrator: Arc<PipelineOrchestrator>) -> Self {
        let interval = Duration::from_secs(orchestrator.config().interval_secs.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tracing::info!(
            interval_secs = interval.as_secs(),
            audio_batch_limit = orchestrator.config().audio_batch_limit,
            video_batch_limit = orchestrator.config().video_batch_limit,
            "Media pipeline scheduler started"
        );

        let handles = MediaType::ALL
            .into_iter()
            .map(|media_type| {
                let orchestrator = orchestrator.clone();
                let shutdown_rx = shutdown_rx.clone();
                tokio::spawn(async move {
                    Self::run_loop(orchestrator, media_type, interval, shutdown_rx).await;
                })
            })
            .collect();

        Self {
            shutdown_tx,
            handles,
        }
    }

    async fn run_loop(
        orchestrator: Arc<PipelineOrchestrator>,
        media_type: MediaType,
        interval: Duration,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => break,
                _ = ticker.tick() => {
                    if let Err(e) = orchestrator.run_batch(media_type, None).await {
                        tracing::error!(
                            media_type = %media_type,
                            error = %e,
                            "Media pipeline batch failed, retrying next tick"
                        );
                    }
                }
            }
            if *shutdown_rx.borrow() {
                break;
            }
        }

        tracing::info!(media_type = %media_type, "Media pipeline loop stopped");
    }

    pub async fn shutdown(self) {
        tracing::info!("Stopping media pipeline scheduler");
        let _ = self.shutdown_tx.send(true);
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Media pipeline loop panicked");
            }
        }
    }
}
