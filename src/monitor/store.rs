use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::error::MonitorError;
use super::job::{Job, JobStatus};

/// One status transition decided during a cycle
///
/// The observed fields are the state the decision was based on; the store
/// applies the change only while the row still holds them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub name: String,
    pub new_status: JobStatus,
    pub observed_status: JobStatus,
    pub observed_last_run: DateTime<Utc>,
}

/// Result of a successful batch commit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitOutcome {
    /// Changes written
    pub applied: Vec<String>,
    /// Changes dropped because the job moved on since the snapshot
    pub stale: Vec<String>,
}

/// Durable registry of jobs, as consumed by the reconciler
#[async_trait]
pub trait JobStore: Send + Sync {
    /// All jobs with a non-empty schedule
    async fn list_jobs_with_schedule(&self) -> Result<Vec<Job>, MonitorError>;

    /// Apply `changes` atomically; on error nothing is written
    async fn commit_status_changes(
        &self,
        changes: &[StatusChange],
    ) -> Result<CommitOutcome, MonitorError>;
}
