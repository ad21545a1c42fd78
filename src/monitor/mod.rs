//! Missed-execution detection
//!
//! - `schedule`: cron parsing and "previous expected run" evaluation
//! - `detector`: per-job missed/not-missed decision
//! - `reconciler`: one reconciliation cycle over every scheduled job
//! - `store`, `clock`: the seams the reconciler is driven through

pub mod clock;
pub mod detector;
pub mod error;
pub mod job;
pub mod reconciler;
pub mod schedule;
pub mod store;

pub use clock::{Clock, SystemClock};
pub use error::MonitorError;
pub use job::{Job, JobStatus};
pub use reconciler::Reconciler;
pub use schedule::CronExpr;
pub use store::{CommitOutcome, JobStore, StatusChange};
