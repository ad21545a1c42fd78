use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};
use tracing::debug;

use crate::db::models::JobRow;
use crate::monitor::{CommitOutcome, JobStatus, StatusChange};

const JOB_COLUMNS: &str = "id, name, schedule, status, last_run, created_at";

/// Repository for Job database operations
pub struct JobRepository;

impl JobRepository {
    /// Register a new job and return the full record
    ///
    /// `created_at` and `last_run` both start at `now`; status starts as pending
    pub async fn create(
        pool: &Pool<Postgres>,
        name: &str,
        schedule: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<JobRow, sqlx::Error> {
        debug!("Creating job: name={}, schedule={:?}", name, schedule);

        let row = sqlx::query_as::<_, JobRow>(&format!(
            r#"
            INSERT INTO jobs (name, schedule, status, last_run, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4, $4)
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(name)
        .bind(schedule)
        .bind(JobStatus::Pending.as_str())
        .bind(now)
        .fetch_one(pool)
        .await?;

        debug!("Job created with id={}", row.id);
        Ok(row)
    }

    /// List jobs in registration order
    pub async fn list(pool: &Pool<Postgres>, skip: i64, limit: i64) -> Result<Vec<JobRow>, sqlx::Error> {
        sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs ORDER BY id OFFSET $1 LIMIT $2"
        ))
        .bind(skip)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_name(pool: &Pool<Postgres>, name: &str) -> Result<Option<JobRow>, sqlx::Error> {
        sqlx::query_as::<_, JobRow>(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE name = $1"))
            .bind(name)
            .fetch_optional(pool)
            .await
    }

    /// Record a start/success/failure report
    ///
    /// - `last_run` never moves backwards, even if reports arrive out of order
    /// - Returns `None` when no job has that name
    pub async fn record_report(
        pool: &Pool<Postgres>,
        name: &str,
        status: JobStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<JobRow>, sqlx::Error> {
        debug!("Recording report: name={}, status={}", name, status);

        sqlx::query_as::<_, JobRow>(&format!(
            r#"
            UPDATE jobs
            SET status = $2, last_run = GREATEST(last_run, $3), updated_at = $3
            WHERE name = $1
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(name)
        .bind(status.as_str())
        .bind(at)
        .fetch_optional(pool)
        .await
    }

    /// All jobs carrying a non-empty schedule
    pub async fn list_with_schedule(pool: &Pool<Postgres>) -> Result<Vec<JobRow>, sqlx::Error> {
        sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE schedule IS NOT NULL AND btrim(schedule) <> '' ORDER BY id"
        ))
        .fetch_all(pool)
        .await
    }

    /// Apply a batch of status changes in a single transaction
    ///
    /// - An update only lands if the row still has the status and `last_run`
    ///   the change was decided on; rows that moved on are reported as stale
    /// - Any database error rolls back the whole batch
    pub async fn apply_status_changes(
        pool: &Pool<Postgres>,
        changes: &[StatusChange],
    ) -> Result<CommitOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let mut outcome = CommitOutcome::default();

        for change in changes {
            let result = sqlx::query(
                r#"
                UPDATE jobs
                SET status = $2, updated_at = NOW()
                WHERE name = $1 AND status = $3 AND last_run = $4
                "#,
            )
            .bind(&change.name)
            .bind(change.new_status.as_str())
            .bind(change.observed_status.as_str())
            .bind(change.observed_last_run)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 1 {
                outcome.applied.push(change.name.clone());
            } else {
                outcome.stale.push(change.name.clone());
            }
        }

        tx.commit().await?;
        debug!(
            "Status changes committed: {} applied, {} stale",
            outcome.applied.len(),
            outcome.stale.len()
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sqlx::PgPool;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, h, m, 0).unwrap()
    }

    fn mark_missed(row: &JobRow, name: &str) -> StatusChange {
        StatusChange {
            name: name.to_string(),
            new_status: JobStatus::Missed,
            observed_status: row.status.parse().unwrap(),
            observed_last_run: row.last_run,
        }
    }

    async fn status_of(pool: &PgPool, name: &str) -> String {
        JobRepository::find_by_name(pool, name).await.unwrap().unwrap().status
    }

    #[sqlx::test]
    #[ignore = "needs DATABASE_URL pointing at a Postgres server"]
    async fn report_after_snapshot_leaves_change_stale(pool: PgPool) {
        let quiet = JobRepository::create(&pool, "quiet", Some("0 * * * *"), at(9, 0)).await.unwrap();
        let busy = JobRepository::create(&pool, "busy", Some("0 * * * *"), at(9, 0)).await.unwrap();

        // "busy" reports between the snapshot and the commit
        JobRepository::record_report(&pool, "busy", JobStatus::Success, at(10, 0))
            .await
            .unwrap();

        let changes = [mark_missed(&quiet, "quiet"), mark_missed(&busy, "busy")];
        let outcome = JobRepository::apply_status_changes(&pool, &changes).await.unwrap();

        assert_eq!(outcome.applied, vec!["quiet".to_string()]);
        assert_eq!(outcome.stale, vec!["busy".to_string()]);
        assert_eq!(status_of(&pool, "quiet").await, "missed");
        assert_eq!(status_of(&pool, "busy").await, "success");
    }

    #[sqlx::test]
    #[ignore = "needs DATABASE_URL pointing at a Postgres server"]
    async fn failed_batch_writes_nothing(pool: PgPool) {
        let quiet = JobRepository::create(&pool, "quiet", Some("0 * * * *"), at(9, 0)).await.unwrap();

        // Postgres rejects NUL bytes in text, failing the second update
        let mut broken = mark_missed(&quiet, "quiet");
        broken.name = "bad\0name".to_string();

        let result = JobRepository::apply_status_changes(&pool, &[mark_missed(&quiet, "quiet"), broken]).await;

        assert!(result.is_err());
        assert_eq!(status_of(&pool, "quiet").await, "pending");
    }

    #[sqlx::test]
    #[ignore = "needs DATABASE_URL pointing at a Postgres server"]
    async fn late_report_does_not_move_last_run_backwards(pool: PgPool) {
        JobRepository::create(&pool, "backup", Some("0 * * * *"), at(9, 0)).await.unwrap();
        JobRepository::record_report(&pool, "backup", JobStatus::Success, at(11, 0))
            .await
            .unwrap();

        let row = JobRepository::record_report(&pool, "backup", JobStatus::Running, at(10, 0))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(row.status, "running");
        assert_eq!(row.last_run, at(11, 0));
    }

    #[sqlx::test]
    #[ignore = "needs DATABASE_URL pointing at a Postgres server"]
    async fn blank_schedules_are_not_listed(pool: PgPool) {
        JobRepository::create(&pool, "hourly", Some("0 * * * *"), at(9, 0)).await.unwrap();
        JobRepository::create(&pool, "manual", None, at(9, 0)).await.unwrap();
        JobRepository::create(&pool, "blank", Some("  "), at(9, 0)).await.unwrap();

        let rows = JobRepository::list_with_schedule(&pool).await.unwrap();
        let names: Vec<_> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["hourly"]);
    }
}
