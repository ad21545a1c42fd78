use actix_web::{
    HttpResponse, get, post,
    web::{Data, Path, Query, ServiceConfig, scope},
};
use actix_web_validator::Json;

use super::models::{ListQuery, RegisterJob, Report};
use super::service::{JobService, ServiceError};

#[post("")]
async fn register_job(
    job: Json<RegisterJob>,
    service: Data<JobService>,
) -> Result<HttpResponse, ServiceError> {
    let response = service.register(&job).await?;
    Ok(HttpResponse::Created().json(response))
}

#[get("")]
async fn list_jobs(
    query: Query<ListQuery>,
    service: Data<JobService>,
) -> Result<HttpResponse, ServiceError> {
    let response = service.list(query.skip, query.limit).await?;
    Ok(HttpResponse::Ok().json(response))
}

#[get("/{name}")]
async fn get_job(name: Path<String>, service: Data<JobService>) -> Result<HttpResponse, ServiceError> {
    let job = service.get(&name).await?;
    Ok(HttpResponse::Ok().json(job))
}

#[post("/{name}/start")]
async fn report_start(name: Path<String>, service: Data<JobService>) -> Result<HttpResponse, ServiceError> {
    let response = service.report(&name, Report::Start).await?;
    Ok(HttpResponse::Ok().json(response))
}

#[post("/{name}/success")]
async fn report_success(name: Path<String>, service: Data<JobService>) -> Result<HttpResponse, ServiceError> {
    let response = service.report(&name, Report::Success).await?;
    Ok(HttpResponse::Ok().json(response))
}

#[post("/{name}/failure")]
async fn report_failure(name: Path<String>, service: Data<JobService>) -> Result<HttpResponse, ServiceError> {
    let response = service.report(&name, Report::Failure).await?;
    Ok(HttpResponse::Ok().json(response))
}

pub fn job_config(config: &mut ServiceConfig) {
    config.service(
        scope("/jobs")
            .service(register_job)
            .service(list_jobs)
            .service(get_job)
            .service(report_start)
            .service(report_success)
            .service(report_failure),
    );
}
