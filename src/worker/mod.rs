pub mod miss_scheduler;

pub use miss_scheduler::{MissedJobScheduler, SchedulerHandle};
