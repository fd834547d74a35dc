use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::application::{AppResult, ChannelSender, Notifier};
use crate::domain::{ChangeNotice, ChannelConfig};

/// Upper bound on any single outbound call.
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Dispatches a change notice to every configured channel independently.
/// A channel's failure is logged and never blocks the other channels; no
/// retries happen here, the next detected change is a fresh attempt.
pub struct NotificationFanout {
    senders: Vec<Arc<dyn ChannelSender>>,
    dry_run: bool,
}

impl NotificationFanout {
    pub fn new(senders: Vec<Arc<dyn ChannelSender>>, dry_run: bool) -> Self {
        Self { senders, dry_run }
    }
}

#[async_trait]
impl Notifier for NotificationFanout {
    async fn notify(&self, notice: &ChangeNotice, channels: &[ChannelConfig]) -> AppResult<()> {
        for config in channels {
            // 半填的渠道视为未配置, 直接跳过
            if !config.is_configured() {
                continue;
            }
            let kind = config.kind_name();
            let Some(sender) = self.senders.iter().find(|s| s.kind() == kind) else {
                warn!(kind, "no sender registered for channel kind");
                continue;
            };
            if self.dry_run {
                info!(kind, target_id = %notice.target_id, "dry-run: notification suppressed");
                continue;
            }
            match tokio::time::timeout(SEND_TIMEOUT, sender.send(config, notice)).await {
                Ok(Ok(())) => {
                    info!(kind, target_id = %notice.target_id, "notification sent");
                }
                Ok(Err(e)) => {
                    warn!(kind, target_id = %notice.target_id, error = %e, "notification failed");
                }
                Err(_) => {
                    warn!(kind, target_id = %notice.target_id, "notification timed out");
                }
            }
        }
        Ok(())
    }
}
