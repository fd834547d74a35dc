use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::application::{AppError, AppResult, ChannelSender};
use crate::domain::{ChangeNotice, ChannelConfig};

/// SMTP submission, one message per detected change.
pub struct EmailSender;

impl EmailSender {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EmailSender {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChannelSender for EmailSender {
    fn kind(&self) -> &'static str {
        "email"
    }

    async fn send(&self, config: &ChannelConfig, notice: &ChangeNotice) -> AppResult<()> {
        let ChannelConfig::Email {
            smtp_host,
            smtp_port,
            smtp_user,
            smtp_password,
            from_addr,
            to_addr,
        } = config
        else {
            return Err(AppError::Notifier(
                "email sender received a non-email channel".into(),
            ));
        };

        let from: Mailbox = from_addr
            .parse()
            .map_err(|e| AppError::Notifier(format!("from address: {e}")))?;
        let to: Mailbox = to_addr
            .parse()
            .map_err(|e| AppError::Notifier(format!("to address: {e}")))?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(notice.subject())
            .body(notice.body())
            .map_err(|e| AppError::Notifier(e.to_string()))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(smtp_host)
            .map_err(|e| AppError::Notifier(e.to_string()))?
            .port(*smtp_port);
        if !smtp_user.is_empty() {
            builder = builder.credentials(Credentials::new(
                smtp_user.clone(),
                smtp_password.clone(),
            ));
        }

        builder
            .build()
            .send(message)
            .await
            .map_err(|e| AppError::Notifier(e.to_string()))?;

        Ok(())
    }
}
