use async_trait::async_trait;
use serde::Serialize;

use crate::application::{AppError, AppResult, ChannelSender};
use crate::domain::{ChangeNotice, ChannelConfig};

/// Telegram bot API sender.
pub struct TelegramSender {
    client: reqwest::Client,
}

impl TelegramSender {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for TelegramSender {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

#[async_trait]
impl ChannelSender for TelegramSender {
    fn kind(&self) -> &'static str {
        "telegram"
    }

    async fn send(&self, config: &ChannelConfig, notice: &ChangeNotice) -> AppResult<()> {
        let ChannelConfig::Telegram { bot_token, chat_id } = config else {
            return Err(AppError::Notifier(
                "telegram sender received a non-telegram channel".into(),
            ));
        };

        let text = format!(
            "<b>网页变化提醒</b>\n\n检测到页面有新变化！\n<b>目标:</b> {}\n<b>网址:</b> {}\n<b>检测时间:</b> {}",
            notice.label,
            notice.url,
            notice.detected_at.to_rfc3339()
        );
        let payload = SendMessage {
            chat_id,
            text: &text,
            parse_mode: "HTML",
        };

        let url = format!("https://api.telegram.org/bot{bot_token}/sendMessage");
        self.client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::Notifier(e.to_string()))?
            .error_for_status()
            .map_err(|e| AppError::Notifier(e.to_string()))?;

        Ok(())
    }
}
