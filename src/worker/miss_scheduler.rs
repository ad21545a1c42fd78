use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::monitor::{MonitorError, Reconciler};

/// Background task that runs a reconciliation cycle on a fixed interval
pub struct MissedJobScheduler {
    reconciler: Arc<Reconciler>,
    interval: Duration,
}

impl MissedJobScheduler {
    /// Create a scheduler that will run `reconciler` every `interval` (UTC)
    pub fn new(reconciler: Arc<Reconciler>, interval: Duration) -> Self {
        Self {
            reconciler,
            interval,
        }
    }

    /// Spawn the loop and return a handle to stop it
    ///
    /// # Architecture
    /// - The first cycle runs one interval after start
    /// - Cycles run inline on the loop task, so they never overlap
    /// - A cycle that overruns the interval causes the missed ticks to be
    ///   skipped rather than queued
    /// - Cycle errors are logged; the next tick retries from a fresh snapshot
    pub fn start(self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(self.run(shutdown_rx));
        SchedulerHandle { shutdown_tx, join }
    }

    async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!("Missed job scheduler started (interval: {:?})", self.interval);

        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.reconciler.tick().await {
                        Ok(_) => {}
                        Err(MonitorError::CycleInProgress) => {
                            warn!("Previous missed job check still running, skipping this tick");
                        }
                        Err(e) => {
                            error!("Missed job check aborted, nothing committed: {}", e);
                        }
                    }
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Missed job scheduler stopped");
    }
}

/// Handle to a running [`MissedJobScheduler`]
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signal the loop to stop and wait for it
    ///
    /// A cycle already in progress is allowed to finish first
    pub async fn stop(self) {
        if let Err(e) = self.shutdown_tx.send(true) {
            error!("Failed to send shutdown signal to scheduler: {:?}", e);
        }
        if let Err(e) = self.join.await {
            error!("Missed job scheduler task failed: {:?}", e);
        }
    }
}
