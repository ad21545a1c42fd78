use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::monitor::{Job, JobStatus};

/// Database representation of a job with all fields
#[derive(Debug, Clone, FromRow)]
pub struct JobRow {
    pub id: i32,
    pub name: String,
    pub schedule: Option<String>,
    pub status: String,
    pub last_run: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<JobRow> for Job {
    type Error = String;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let status: JobStatus = row.status.parse()?;
        Ok(Job {
            name: row.name,
            schedule: row.schedule,
            status,
            last_run: row.last_run,
            created_at: row.created_at,
        })
    }
}
