use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use image::DynamicImage;

use crate::domain::{BrowserCookie, ChangeNotice, ChannelConfig, MonitorTarget};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("render error: {0}")]
    Render(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("notifier error: {0}")]
    Notifier(String),
    #[error("invalid config: {0}")]
    Config(String),
}

pub type AppResult<T> = Result<T, AppError>;

/// Read/write contract against the configuration store. Target rows are
/// created and mutated by the external admin UI; the engine only reads
/// them and writes back run metadata.
#[async_trait]
pub trait TargetStore: Send + Sync {
    async fn get_target(&self, id: &str) -> AppResult<Option<MonitorTarget>>;
    async fn list_active_targets(&self) -> AppResult<Vec<MonitorTarget>>;
    async fn update_run_metadata(
        &self,
        id: &str,
        last_checked: DateTime<Utc>,
        last_changed: Option<DateTime<Utc>>,
    ) -> AppResult<()>;
    async fn channel_set(&self) -> AppResult<Vec<ChannelConfig>>;
}

/// Most recent raster per target; replaced, never versioned.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn get(&self, target_id: &str) -> AppResult<Option<DynamicImage>>;
    async fn put(&self, target_id: &str, image: &DynamicImage) -> AppResult<()>;
    async fn remove(&self, target_id: &str) -> AppResult<()>;
}

/// One live browser page. Obtained from [`PageRenderer::open`], must be
/// closed on every exit path.
#[async_trait]
pub trait RenderSession: Send + Sync {
    async fn navigate(&self, url: &str) -> AppResult<()>;
    async fn inject_cookies(&self, cookies: &[BrowserCookie]) -> AppResult<()>;
    async fn reload(&self) -> AppResult<()>;
    async fn wait_for(&self, selector: &str, timeout: Duration) -> AppResult<()>;
    async fn fill(&self, selector: &str, text: &str) -> AppResult<()>;
    async fn click(&self, selector: &str) -> AppResult<()>;
    async fn capture(&self) -> AppResult<DynamicImage>;
    async fn close(self: Box<Self>) -> AppResult<()>;
}

/// Render capability. Each `open` corresponds to one live render session
/// and therefore one concurrency-gate permit.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn open(&self, viewport_width: u32, max_height: u32) -> AppResult<Box<dyn RenderSession>>;
}

/// One outbound transport kind (email / telegram / webhook). Renders the
/// notice into its own payload shape and performs one send.
#[async_trait]
pub trait ChannelSender: Send + Sync {
    fn kind(&self) -> &'static str;
    async fn send(&self, config: &ChannelConfig, notice: &ChangeNotice) -> AppResult<()>;
}

/// Fan a detected change out to the configured channels.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notice: &ChangeNotice, channels: &[ChannelConfig]) -> AppResult<()>;
}
