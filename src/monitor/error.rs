use thiserror::Error;

use super::schedule::ScheduleError;

/// Failures inside the reconciliation core
///
/// The scheduler loop logs these and retries on the next tick
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("invalid schedule: {0}")]
    InvalidSchedule(#[from] ScheduleError),

    #[error("job store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("notification failed: {0}")]
    Notification(String),

    #[error("a reconciliation cycle is already running")]
    CycleInProgress,
}

impl From<sqlx::Error> for MonitorError {
    fn from(err: sqlx::Error) -> Self {
        MonitorError::StoreUnavailable(err.to_string())
    }
}
