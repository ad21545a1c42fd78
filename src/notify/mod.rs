pub mod slack;

use async_trait::async_trait;

use crate::monitor::MonitorError;

pub use slack::SlackNotifier;

/// Best-effort outbound alert channel
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str) -> Result<(), MonitorError>;
}
