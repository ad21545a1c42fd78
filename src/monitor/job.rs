use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a monitored job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Registered, no report received yet
    Pending,
    /// The job reported that it started
    Running,
    /// The last run reported success
    Success,
    /// The last run reported failure
    Failure,
    /// An expected run was not reported; only the reconciler sets this
    Missed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Success => "success",
            JobStatus::Failure => "failure",
            JobStatus::Missed => "missed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "success" => Ok(JobStatus::Success),
            "failure" => Ok(JobStatus::Failure),
            "missed" => Ok(JobStatus::Missed),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

/// A monitored job as seen by the reconciler and the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub name: String,
    /// Cron expression; `None` exempts the job from miss detection
    pub schedule: Option<String>,
    pub status: JobStatus,
    /// Time of the last status-changing report, or creation
    pub last_run: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Job {
    /// The schedule, if present and not blank
    pub fn active_schedule(&self) -> Option<&str> {
        self.schedule
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_text() {
        for status in [
            JobStatus::Pending,
            JobStatus::Running,
            JobStatus::Success,
            JobStatus::Failure,
            JobStatus::Missed,
        ] {
            assert_eq!(status.as_str().parse::<JobStatus>(), Ok(status));
        }
        assert!("completed".parse::<JobStatus>().is_err());
    }

    #[test]
    fn status_serializes_as_snake_case() {
        let json = serde_json::to_string(&JobStatus::Missed).unwrap();
        assert_eq!(json, "\"missed\"");
    }

    #[test]
    fn blank_schedule_is_not_active() {
        let now = Utc::now();
        let mut job = Job {
            name: "backup".to_string(),
            schedule: Some("  ".to_string()),
            status: JobStatus::Pending,
            last_run: now,
            created_at: now,
        };
        assert_eq!(job.active_schedule(), None);

        job.schedule = Some("0 * * * *".to_string());
        assert_eq!(job.active_schedule(), Some("0 * * * *"));
    }
}
