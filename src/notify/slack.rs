use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use super::Notifier;
use crate::monitor::MonitorError;

#[derive(Debug, Serialize)]
struct SlackMessage<'a> {
    text: &'a str,
}

/// Posts alerts to a Slack incoming webhook
///
/// Without a webhook URL every message is written to the log instead
pub struct SlackNotifier {
    client: reqwest::Client,
    webhook_url: Option<String>,
}

impl SlackNotifier {
    pub fn new(webhook_url: Option<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            webhook_url,
        })
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn notify(&self, message: &str) -> Result<(), MonitorError> {
        let Some(url) = self.webhook_url.as_deref() else {
            warn!("SLACK_WEBHOOK_URL is not set, cannot send notification");
            info!("(Fallback) Notification: {}", message);
            return Ok(());
        };

        self.client
            .post(url)
            .json(&SlackMessage { text: message })
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| MonitorError::Notification(e.to_string()))?;

        info!("Sent notification to Slack");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_uses_text_field() {
        let json = serde_json::to_value(SlackMessage { text: "Job 'backup' has failed." }).unwrap();
        assert_eq!(json, serde_json::json!({"text": "Job 'backup' has failed."}));
    }

    #[tokio::test]
    async fn falls_back_to_log_without_webhook() {
        let notifier = SlackNotifier::new(None, Duration::from_secs(1)).unwrap();
        assert!(notifier.notify("hello").await.is_ok());
    }

    #[tokio::test]
    async fn unreachable_webhook_is_a_notification_error() {
        let notifier = SlackNotifier::new(
            Some("http://127.0.0.1:9/hook".to_string()),
            Duration::from_secs(2),
        )
        .unwrap();
        let err = notifier.notify("hello").await.unwrap_err();
        assert!(matches!(err, MonitorError::Notification(_)));
    }
}
