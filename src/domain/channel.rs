use serde::{Deserialize, Serialize};

/// One configured outbound notification channel. Serialized (tagged) into
/// the configuration store; the admin UI writes the same shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelConfig {
    Email {
        smtp_host: String,
        smtp_port: u16,
        #[serde(default)]
        smtp_user: String,
        #[serde(default)]
        smtp_password: String,
        from_addr: String,
        to_addr: String,
    },
    Telegram {
        bot_token: String,
        chat_id: String,
    },
    Webhook {
        url: String,
    },
}

impl ChannelConfig {
    pub fn kind_name(&self) -> &'static str {
        match self {
            ChannelConfig::Email { .. } => "email",
            ChannelConfig::Telegram { .. } => "telegram",
            ChannelConfig::Webhook { .. } => "webhook",
        }
    }

    /// A channel counts as configured only when every required field is
    /// non-empty; partially-filled channels are skipped by the fan-out.
    /// SMTP credentials are optional (open relays exist on LANs).
    pub fn is_configured(&self) -> bool {
        match self {
            ChannelConfig::Email {
                smtp_host,
                from_addr,
                to_addr,
                ..
            } => !smtp_host.is_empty() && !from_addr.is_empty() && !to_addr.is_empty(),
            ChannelConfig::Telegram { bot_token, chat_id } => {
                !bot_token.is_empty() && !chat_id.is_empty()
            }
            ChannelConfig::Webhook { url } => !url.is_empty(),
        }
    }
}
