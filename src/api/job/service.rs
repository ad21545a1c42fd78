use std::sync::Arc;
use std::time::Duration;

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use sqlx::{Pool, Postgres};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::api::validation::ErrorResponse;
use crate::db::job_repository::JobRepository;
use crate::db::models::JobRow;
use crate::monitor::{Clock, Job, JobStatus};
use crate::notify::Notifier;
use super::dto::{JobListResponse, JobResponse};
use super::models::{Report, RegisterJob};

const MAX_PAGE_SIZE: i64 = 1000;

/// Service-level errors
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job already registered: {0}")]
    Conflict(String),

    /// A stored row that does not map onto the domain model
    #[error("Corrupt job record: {0}")]
    Corrupt(String),
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Database(_) | ServiceError::Corrupt(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            ServiceError::Database(e) => {
                error!("Database error: {}", e);
                ErrorResponse::message("Failed to process request", "Database error occurred")
            }
            ServiceError::Corrupt(msg) => {
                error!("Corrupt job record: {}", msg);
                ErrorResponse::message("Failed to process request", "Stored job is unreadable")
            }
            ServiceError::Validation(msg) => {
                warn!("Validation error: {}", msg);
                ErrorResponse::message("Validation failed", msg.clone())
            }
            ServiceError::NotFound(name) => {
                warn!("Job not found: {}", name);
                ErrorResponse::message("Not found", format!("Job with name '{}' not found", name))
            }
            ServiceError::Conflict(name) => {
                warn!("Duplicate job registration: {}", name);
                ErrorResponse::message("Conflict", format!("Job with name '{}' already registered", name))
            }
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}

fn into_job(row: JobRow) -> Result<Job, ServiceError> {
    Job::try_from(row).map_err(ServiceError::Corrupt)
}

/// Job service containing registration and reporting logic
pub struct JobService {
    pool: Pool<Postgres>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    notify_timeout: Duration,
}

impl JobService {
    pub fn new(
        pool: Pool<Postgres>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        notify_timeout: Duration,
    ) -> Self {
        Self {
            pool,
            notifier,
            clock,
            notify_timeout,
        }
    }

    /// Register a job for monitoring
    ///
    /// # Returns
    /// - `Ok(JobResponse)` - Job created with status pending
    /// - `Err(ServiceError::Conflict)` - A job with that name exists
    pub async fn register(&self, job: &RegisterJob) -> Result<JobResponse, ServiceError> {
        info!("Service: Registering job name={} schedule={:?}", job.name, job.schedule);

        let row = JobRepository::create(&self.pool, &job.name, job.normalized_schedule(), self.clock.now())
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                    ServiceError::Conflict(job.name.clone())
                }
                other => ServiceError::Database(other),
            })?;

        info!("Service: Job registered with id={}", row.id);
        Ok(JobResponse {
            message: "Job registered successfully".to_string(),
            job: into_job(row)?,
        })
    }

    pub async fn list(&self, skip: i64, limit: i64) -> Result<JobListResponse, ServiceError> {
        if skip < 0 || limit < 1 {
            return Err(ServiceError::Validation(
                "skip must be >= 0 and limit must be >= 1".to_string(),
            ));
        }
        let rows = JobRepository::list(&self.pool, skip, limit.min(MAX_PAGE_SIZE)).await?;
        let jobs = rows.into_iter().map(into_job).collect::<Result<Vec<_>, _>>()?;
        Ok(JobListResponse {
            count: jobs.len(),
            jobs,
        })
    }

    pub async fn get(&self, name: &str) -> Result<Job, ServiceError> {
        let row = JobRepository::find_by_name(&self.pool, name)
            .await?
            .ok_or_else(|| ServiceError::NotFound(name.to_string()))?;
        into_job(row)
    }

    /// Record a start/success/failure report from a job
    ///
    /// # Business Logic
    /// - Sets the reported status and moves `last_run` to now
    /// - Any report ends a miss episode
    /// - A failure report sends a notification in the background
    pub async fn report(&self, name: &str, report: Report) -> Result<JobResponse, ServiceError> {
        let status = report.status();
        info!("Service: Job {} reported {}", name, status);

        let row = JobRepository::record_report(&self.pool, name, status, self.clock.now())
            .await?
            .ok_or_else(|| ServiceError::NotFound(name.to_string()))?;

        if status == JobStatus::Failure {
            self.notify_in_background(format!("Job '{}' has failed.", name));
        }

        Ok(JobResponse {
            message: format!("Job marked as {}", status),
            job: into_job(row)?,
        })
    }

    fn notify_in_background(&self, message: String) {
        let notifier = Arc::clone(&self.notifier);
        let timeout = self.notify_timeout;
        tokio::spawn(async move {
            match tokio::time::timeout(timeout, notifier.notify(&message)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Failure notification not sent: {}", e),
                Err(_) => error!("Failure notification timed out after {:?}", timeout),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;
    use rstest::rstest;

    #[rstest]
    #[case(ServiceError::Validation("bad".into()), StatusCode::BAD_REQUEST)]
    #[case(ServiceError::NotFound("backup".into()), StatusCode::NOT_FOUND)]
    #[case(ServiceError::Conflict("backup".into()), StatusCode::CONFLICT)]
    #[case(ServiceError::Corrupt("bad status".into()), StatusCode::INTERNAL_SERVER_ERROR)]
    #[case(ServiceError::Database(sqlx::Error::RowNotFound), StatusCode::INTERNAL_SERVER_ERROR)]
    fn errors_map_to_http_status(#[case] err: ServiceError, #[case] expected: StatusCode) {
        assert_eq!(err.error_response().status(), expected);
    }

    #[actix_web::test]
    async fn not_found_body_names_the_job() {
        let response = ServiceError::NotFound("backup".into()).error_response();
        let body = to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Not found");
        assert_eq!(json["fields"]["message"], "Job with name 'backup' not found");
    }
}
