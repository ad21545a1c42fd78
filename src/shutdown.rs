use actix_web::dev::ServerHandle;
use sqlx::{Pool, Postgres};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::worker::SchedulerHandle;

/// Handles graceful shutdown of the application
///
/// On SIGTERM or SIGINT/CTRL+C:
/// 1. Stop the HTTP server (no new reports are accepted)
/// 2. Stop the missed job scheduler, letting a running check finish
/// 3. Close database connections
pub struct ShutdownCoordinator {
    server_handle: ServerHandle,
    server_task: JoinHandle<Result<(), std::io::Error>>,
    scheduler: SchedulerHandle,
    pool: Pool<Postgres>,
}

impl ShutdownCoordinator {
    pub fn new(
        server_handle: ServerHandle,
        server_task: JoinHandle<Result<(), std::io::Error>>,
        scheduler: SchedulerHandle,
        pool: Pool<Postgres>,
    ) -> Self {
        Self {
            server_handle,
            server_task,
            scheduler,
            pool,
        }
    }

    /// Wait for a shutdown signal, then shut everything down in order
    pub async fn wait_for_shutdown(self) -> Result<(), std::io::Error> {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            let mut terminate =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
            tokio::select! {
                result = ctrl_c => {
                    result?;
                    info!("Received CTRL+C signal, initiating graceful shutdown...");
                }
                _ = terminate.recv() => {
                    info!("Received SIGTERM signal, initiating graceful shutdown...");
                }
            }
        }

        #[cfg(not(unix))]
        {
            ctrl_c.await?;
            info!("Received CTRL+C signal, initiating graceful shutdown...");
        }

        self.shutdown().await
    }

    async fn shutdown(self) -> Result<(), std::io::Error> {
        info!("Stopping HTTP server...");
        self.server_handle.stop(true).await;

        info!("Stopping missed job scheduler...");
        self.scheduler.stop().await;

        match self.server_task.await {
            Ok(Ok(())) => info!("HTTP server shut down"),
            Ok(Err(e)) => error!("HTTP server encountered error during shutdown: {:?}", e),
            Err(e) => error!("HTTP server task panicked: {:?}", e),
        }

        info!("Closing database connection pool...");
        self.pool.close().await;

        info!("Graceful shutdown completed");
        Ok(())
    }
}
