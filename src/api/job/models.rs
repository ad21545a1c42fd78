use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::monitor::{CronExpr, JobStatus};

/// Request body for registering a job
#[derive(Deserialize, Serialize, Debug, Validate)]
pub struct RegisterJob {
    #[validate(length(
        min = 1,
        max = 100,
        message = "Name must be between 1 and 100 characters"
    ))]
    pub name: String,

    /// 5-field cron expression; omit for jobs that only report
    #[validate(custom(function = "validate_schedule"))]
    pub schedule: Option<String>,
}

impl RegisterJob {
    /// Schedule with surrounding whitespace removed; blank means none
    pub fn normalized_schedule(&self) -> Option<&str> {
        self.schedule
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

fn validate_schedule(schedule: &str) -> Result<(), ValidationError> {
    if schedule.trim().is_empty() {
        return Ok(());
    }
    CronExpr::parse(schedule).map(|_| ()).map_err(|e| {
        let mut err = ValidationError::new("cron");
        err.message = Some(Cow::from(format!("Invalid cron expression: {}", e)));
        err
    })
}

/// The report kinds a job can send about itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Report {
    Start,
    Success,
    Failure,
}

impl Report {
    pub fn status(self) -> JobStatus {
        match self {
            Report::Start => JobStatus::Running,
            Report::Success => JobStatus::Success,
            Report::Failure => JobStatus::Failure,
        }
    }
}

/// Pagination for the job listing
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    100
}
