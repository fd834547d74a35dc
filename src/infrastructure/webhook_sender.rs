use async_trait::async_trait;
use serde_json::json;

use crate::application::{AppError, AppResult, ChannelSender};
use crate::domain::{ChangeNotice, ChannelConfig};

/// Generic push channel: one JSON POST per detected change.
pub struct WebhookSender {
    client: reqwest::Client,
}

impl WebhookSender {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for WebhookSender {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChannelSender for WebhookSender {
    fn kind(&self) -> &'static str {
        "webhook"
    }

    async fn send(&self, config: &ChannelConfig, notice: &ChangeNotice) -> AppResult<()> {
        let ChannelConfig::Webhook { url } = config else {
            return Err(AppError::Notifier(
                "webhook sender received a non-webhook channel".into(),
            ));
        };

        let payload = json!({
            "subject": notice.subject(),
            "body": notice.body(),
            "target_id": notice.target_id,
            "url": notice.url,
            "detected_at": notice.detected_at.to_rfc3339(),
        });

        self.client
            .post(url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::Notifier(e.to_string()))?
            .error_for_status()
            .map_err(|e| AppError::Notifier(e.to_string()))?;

        Ok(())
    }
}
