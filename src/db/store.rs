use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use tracing::warn;

use crate::db::job_repository::JobRepository;
use crate::monitor::{CommitOutcome, Job, JobStore, MonitorError, StatusChange};

/// [`JobStore`] backed by the Postgres `jobs` table
pub struct PgJobStore {
    pool: Pool<Postgres>,
}

impl PgJobStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn list_jobs_with_schedule(&self) -> Result<Vec<Job>, MonitorError> {
        let rows = JobRepository::list_with_schedule(&self.pool).await?;

        // A row the core cannot interpret is skipped, not fatal to the cycle.
        let jobs = rows
            .into_iter()
            .filter_map(|row| {
                let name = row.name.clone();
                Job::try_from(row)
                    .map_err(|e| warn!("Skipping job {}: {}", name, e))
                    .ok()
            })
            .collect();
        Ok(jobs)
    }

    async fn commit_status_changes(
        &self,
        changes: &[StatusChange],
    ) -> Result<CommitOutcome, MonitorError> {
        Ok(JobRepository::apply_status_changes(&self.pool, changes).await?)
    }
}
