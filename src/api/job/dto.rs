use serde::Serialize;

use crate::monitor::Job;

/// Response for a single job
#[derive(Serialize)]
pub struct JobResponse {
    pub message: String,
    pub job: Job,
}

/// Response for the job listing
#[derive(Serialize)]
pub struct JobListResponse {
    pub count: usize,
    pub jobs: Vec<Job>,
}
