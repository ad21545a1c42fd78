use std::io;
use std::sync::Arc;

use actix_web::{App, HttpServer, web};
use clap::Parser;
use sqlx::{Pool, Postgres};
use tracing::{error, info};
use tracing_subscriber::{Layer, filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod cli;
mod config;
mod db;
mod monitor;
mod notify;
mod shutdown;
mod worker;

use crate::api::{health::health_config, job::{JobService, job_config}, validation};
use crate::cli::{Cli, Command};
use crate::config::Config;
use crate::db::PgJobStore;
use crate::monitor::{Clock, Reconciler, SystemClock};
use crate::notify::{Notifier, SlackNotifier};
use crate::shutdown::ShutdownCoordinator;
use crate::worker::MissedJobScheduler;

/// Console output plus daily rotating files split by level
/// (logs/info.log.2024-12-22, logs/error.log.2024-12-22, ...)
fn init_logging(log_dir: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());

    let info_layer = tracing_subscriber::fmt::layer()
        .with_writer(tracing_appender::rolling::daily(log_dir, "info.log"))
        .with_ansi(false)
        .with_filter(LevelFilter::INFO);

    let warn_layer = tracing_subscriber::fmt::layer()
        .with_writer(tracing_appender::rolling::daily(log_dir, "warn.log"))
        .with_ansi(false)
        .with_filter(LevelFilter::WARN);

    let error_layer = tracing_subscriber::fmt::layer()
        .with_writer(tracing_appender::rolling::daily(log_dir, "error.log"))
        .with_ansi(false)
        .with_filter(LevelFilter::ERROR);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(info_layer)
        .with(warn_layer)
        .with(error_layer)
        .init();
}

/// Shared collaborators for the reconciler and the HTTP API
struct Components {
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    reconciler: Arc<Reconciler>,
}

fn build_components(config: &Config, pool: &Pool<Postgres>) -> io::Result<Components> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let notifier: Arc<dyn Notifier> = Arc::new(
        SlackNotifier::new(config.slack_webhook_url.clone(), config.notify_timeout)
            .map_err(io::Error::other)?,
    );
    let reconciler = Reconciler::new(
        Arc::new(PgJobStore::new(pool.clone())),
        Arc::clone(&notifier),
        Arc::clone(&clock),
    )
    .with_notify_timeout(config.notify_timeout);

    Ok(Components {
        clock,
        notifier,
        reconciler: Arc::new(reconciler),
    })
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    let cli = Cli::parse();

    let config = Config::from_env().map_err(io::Error::other)?;

    std::fs::create_dir_all(&config.log_dir)?;
    init_logging(&config.log_dir);

    let pool = db::connection::get_connection(&config.database_url, config.max_db_connections)
        .await
        .map_err(io::Error::other)?;
    info!("Database connection pool established");

    match cli.selected() {
        Command::Migrate => {
            db::migrations::run_migrations(&pool).await.map_err(io::Error::other)?;
            pool.close().await;
            Ok(())
        }
        Command::Check => {
            let components = build_components(&config, &pool)?;
            let result = components.reconciler.tick().await;
            pool.close().await;
            match result {
                Ok(report) => {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                    Ok(())
                }
                Err(e) => {
                    error!("Missed job check failed: {}", e);
                    Err(io::Error::other(e))
                }
            }
        }
        Command::Serve => serve(config, pool).await,
    }
}

async fn serve(config: Config, pool: Pool<Postgres>) -> io::Result<()> {
    info!("Starting cron-monitor");
    info!("  - Check interval: {:?}", config.check_interval);
    info!("  - Max database connections: {}", config.max_db_connections);
    info!("  - Max payload size: {} bytes", config.max_payload_size);
    info!(
        "  - Slack notifications: {}",
        if config.slack_webhook_url.is_some() { "enabled" } else { "log only" }
    );

    // Auto-migrate when starting the server
    db::migrations::run_migrations(&pool).await.map_err(io::Error::other)?;

    let Components {
        clock,
        notifier,
        reconciler,
    } = build_components(&config, &pool)?;

    let scheduler = MissedJobScheduler::new(reconciler, config.check_interval).start();

    let job_service = web::Data::new(JobService::new(
        pool.clone(),
        notifier,
        clock,
        config.notify_timeout,
    ));
    let pool_data = web::Data::new(pool.clone());
    let max_payload_size = config.max_payload_size;

    let server = HttpServer::new(move || {
        App::new()
            .app_data(pool_data.clone())
            .app_data(job_service.clone())
            .app_data(web::PayloadConfig::default().limit(max_payload_size))
            .app_data(validation::json_config(max_payload_size))
            .configure(health_config)
            .configure(job_config)
    })
    .disable_signals()
    .bind((config.bind_addr.as_str(), config.port))?
    .run();

    info!("Server listening on http://{}:{}", config.bind_addr, config.port);

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    ShutdownCoordinator::new(server_handle, server_task, scheduler, pool)
        .wait_for_shutdown()
        .await
}
