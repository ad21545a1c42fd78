use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::clock::Clock;
use super::detector::{evaluate, Decision};
use super::error::MonitorError;
use super::job::{Job, JobStatus};
use super::schedule::previous_scheduled_instant;
use super::store::{JobStore, StatusChange};
use crate::notify::Notifier;

const DEFAULT_NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Summary of one reconciliation cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// Schedule-bearing jobs looked at
    pub examined: usize,
    /// Jobs moved to `missed` this cycle
    pub missed: Vec<String>,
    /// Jobs that reported between snapshot and commit and were left alone
    pub stale: Vec<String>,
    /// Jobs skipped because their schedule does not parse
    pub invalid: Vec<String>,
    /// Notifications that failed or timed out
    pub notify_failures: usize,
}

/// A miss found during a cycle, kept until the commit says whether it stuck
struct MissedRun {
    last_run: DateTime<Utc>,
    expected: DateTime<Utc>,
}

/// Compares every scheduled job against its cron expression and flags the
/// ones that skipped a run
///
/// Cycles never overlap: a second call while one is in flight returns
/// [`MonitorError::CycleInProgress`] without touching the store
pub struct Reconciler {
    store: Arc<dyn JobStore>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    notify_timeout: Duration,
    cycle: Mutex<()>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn JobStore>, notifier: Arc<dyn Notifier>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            notifier,
            clock,
            notify_timeout: DEFAULT_NOTIFY_TIMEOUT,
            cycle: Mutex::new(()),
        }
    }

    /// Upper bound for a single notification call
    pub fn with_notify_timeout(mut self, timeout: Duration) -> Self {
        self.notify_timeout = timeout;
        self
    }

    /// Run one cycle at the injected clock's current time
    pub async fn tick(&self) -> Result<CycleReport, MonitorError> {
        self.run_cycle(self.clock.now()).await
    }

    /// Run one cycle as of `now`
    ///
    /// # Errors
    /// - Per-job schedule errors are logged and the job is skipped
    /// - A store failure aborts the cycle with nothing written
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> Result<CycleReport, MonitorError> {
        let _cycle = self
            .cycle
            .try_lock()
            .map_err(|_| MonitorError::CycleInProgress)?;

        info!("Checking for missed jobs");
        let jobs = self.store.list_jobs_with_schedule().await?;

        let mut report = CycleReport {
            examined: jobs.len(),
            ..CycleReport::default()
        };
        let mut changes = Vec::new();
        let mut misses = HashMap::new();

        for job in &jobs {
            match Self::inspect(job, now) {
                Ok(Some(miss)) => {
                    warn!(
                        job = %job.name,
                        last_run = %miss.last_run.to_rfc3339(),
                        expected = %miss.expected.to_rfc3339(),
                        "Job was missed"
                    );
                    changes.push(StatusChange {
                        name: job.name.clone(),
                        new_status: JobStatus::Missed,
                        observed_status: job.status,
                        observed_last_run: job.last_run,
                    });
                    misses.insert(job.name.clone(), miss);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(job = %job.name, schedule = ?job.schedule, "Skipping job: {}", e);
                    report.invalid.push(job.name.clone());
                }
            }
        }

        if changes.is_empty() {
            info!(examined = report.examined, "Missed job check finished, nothing missed");
            return Ok(report);
        }

        let outcome = self.store.commit_status_changes(&changes).await?;
        for name in &outcome.stale {
            debug!(job = %name, "Job reported during the cycle, leaving it alone");
        }

        let deliveries = outcome.applied.iter().filter_map(|name| {
            let miss = misses.get(name)?;
            Some(self.deliver(name, missed_message(name, miss)))
        });
        let delivered = join_all(deliveries).await;

        report.notify_failures = delivered.iter().filter(|ok| !**ok).count();
        report.missed = outcome.applied;
        report.stale = outcome.stale;

        info!(
            examined = report.examined,
            missed = report.missed.len(),
            stale = report.stale.len(),
            invalid = report.invalid.len(),
            "Missed job check finished"
        );
        Ok(report)
    }

    fn inspect(job: &Job, now: DateTime<Utc>) -> Result<Option<MissedRun>, MonitorError> {
        let Some(schedule) = job.active_schedule() else {
            return Ok(None);
        };
        let expected = previous_scheduled_instant(schedule, now)?;

        match evaluate(job, expected) {
            Decision::MarkMissed => Ok(Some(MissedRun {
                last_run: job.last_run,
                expected,
            })),
            Decision::NoAction => Ok(None),
        }
    }

    /// Send one alert bounded by the notify timeout; `true` if it went out
    async fn deliver(&self, name: &str, message: String) -> bool {
        match tokio::time::timeout(self.notify_timeout, self.notifier.notify(&message)).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                error!(job = %name, "Missed job notification failed: {}", e);
                false
            }
            Err(_) => {
                error!(job = %name, timeout = ?self.notify_timeout, "Missed job notification timed out");
                false
            }
        }
    }
}

fn missed_message(name: &str, miss: &MissedRun) -> String {
    format!(
        "Job '{}' has been missed. Last actual run: {}, last expected run: {}.",
        name,
        miss.last_run.to_rfc3339(),
        miss.expected.to_rfc3339()
    )
}
