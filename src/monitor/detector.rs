use chrono::{DateTime, Utc};

use super::job::{Job, JobStatus};

/// What the reconciler should do with one job this cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    NoAction,
    MarkMissed,
}

/// Decide whether `job` missed the run expected at `expected_last_run`
///
/// - A running job is never missed
/// - A job whose last report is at or after the expected run is on time
/// - A job already `Missed` stays quiet until its next report moves
///   `last_run` forward, so one miss episode produces one notification
pub fn evaluate(job: &Job, expected_last_run: DateTime<Utc>) -> Decision {
    if job.status == JobStatus::Running {
        return Decision::NoAction;
    }
    if expected_last_run <= job.last_run {
        return Decision::NoAction;
    }
    if job.status == JobStatus::Missed {
        return Decision::NoAction;
    }
    Decision::MarkMissed
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rstest::rstest;

    fn job(status: JobStatus, last_run: DateTime<Utc>) -> Job {
        Job {
            name: "backup".to_string(),
            schedule: Some("0 * * * *".to_string()),
            status,
            last_run,
            created_at: last_run - Duration::days(1),
        }
    }

    fn expected() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 14, 0, 0).unwrap()
    }

    #[rstest]
    #[case(JobStatus::Pending)]
    #[case(JobStatus::Success)]
    #[case(JobStatus::Failure)]
    fn stale_reporting_job_is_missed(#[case] status: JobStatus) {
        let j = job(status, expected() - Duration::hours(2));
        assert_eq!(evaluate(&j, expected()), Decision::MarkMissed);
    }

    #[rstest]
    #[case(Duration::zero())]
    #[case(Duration::seconds(1))]
    #[case(Duration::minutes(30))]
    fn report_at_or_after_expected_run_is_on_time(#[case] after: Duration) {
        let j = job(JobStatus::Success, expected() + after);
        assert_eq!(evaluate(&j, expected()), Decision::NoAction);
    }

    #[rstest]
    #[case(Duration::hours(1))]
    #[case(Duration::days(30))]
    fn running_job_is_never_missed(#[case] staleness: Duration) {
        let j = job(JobStatus::Running, expected() - staleness);
        assert_eq!(evaluate(&j, expected()), Decision::NoAction);
    }

    #[test]
    fn second_evaluation_after_marking_is_quiet() {
        let mut j = job(JobStatus::Success, expected() - Duration::hours(2));
        assert_eq!(evaluate(&j, expected()), Decision::MarkMissed);

        j.status = JobStatus::Missed;
        assert_eq!(evaluate(&j, expected()), Decision::NoAction);
        // Still quiet once the next boundary passes without a report.
        assert_eq!(evaluate(&j, expected() + Duration::hours(1)), Decision::NoAction);
    }

    #[test]
    fn report_ends_the_miss_episode() {
        let mut j = job(JobStatus::Missed, expected() - Duration::hours(2));

        // The job reports success after the boundary that caused the miss.
        j.status = JobStatus::Success;
        j.last_run = expected() + Duration::minutes(5);
        assert_eq!(evaluate(&j, expected()), Decision::NoAction);

        // Eligible again only once a newer boundary is crossed.
        let next = expected() + Duration::hours(1);
        assert_eq!(evaluate(&j, next), Decision::MarkMissed);
    }
}
