use actix_web::{HttpResponse, Responder, get, web};
use serde::Serialize;
use sqlx::{Pool, Postgres};
use tracing::error;

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    database: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct RootResponse {
    service: &'static str,
    version: &'static str,
    message: &'static str,
}

/// Run a trivial query; `Err` carries the database error text
async fn probe_database(pool: &Pool<Postgres>) -> Result<(), String> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .map(|_| ())
        .map_err(|e| e.to_string())
}

fn probe_response(result: Result<(), String>, ok: &'static str, failed: &'static str) -> HttpResponse {
    match result {
        Ok(()) => HttpResponse::Ok().json(HealthResponse {
            status: ok,
            database: "connected",
            error: None,
        }),
        Err(e) => {
            error!("Database probe failed: {}", e);
            HttpResponse::ServiceUnavailable().json(HealthResponse {
                status: failed,
                database: "disconnected",
                error: Some(format!("Database error: {}", e)),
            })
        }
    }
}

#[get("/")]
async fn root() -> impl Responder {
    HttpResponse::Ok().json(RootResponse {
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        message: "Cron monitor is running. Register jobs under /jobs.",
    })
}

/// General health check including database connectivity
#[get("/health")]
async fn health_check(pool: web::Data<Pool<Postgres>>) -> impl Responder {
    probe_response(probe_database(&pool).await, "healthy", "unhealthy")
}

/// Readiness probe: 503 while the database is unreachable
#[get("/ready")]
async fn readiness_check(pool: web::Data<Pool<Postgres>>) -> impl Responder {
    probe_response(probe_database(&pool).await, "ready", "not_ready")
}

/// Liveness probe: the process answers, dependencies are not checked
#[get("/live")]
async fn liveness_check() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "alive",
        database: "not_checked",
        error: None,
    })
}

pub fn health_config(config: &mut web::ServiceConfig) {
    config
        .service(root)
        .service(health_check)
        .service(readiness_check)
        .service(liveness_check);
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, http::StatusCode, test};

    #[actix_web::test]
    async fn root_and_liveness_answer_without_database() {
        let app = test::init_service(App::new().configure(health_config)).await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["service"], "cron-monitor");

        let resp = test::call_service(&app, test::TestRequest::get().uri("/live").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn failed_probe_is_service_unavailable() {
        let resp = probe_response(Err("connection refused".to_string()), "ready", "not_ready");
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
