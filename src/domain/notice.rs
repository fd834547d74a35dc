use chrono::{DateTime, Utc};
use serde::Serialize;

/// Human-readable summary of a detected change, handed to the fan-out.
/// Each channel sender renders this into its own payload shape.
#[derive(Clone, Debug, Serialize)]
pub struct ChangeNotice {
    pub target_id: String,
    pub label: String,
    pub url: String,
    pub detected_at: DateTime<Utc>,
}

impl ChangeNotice {
    pub fn subject(&self) -> String {
        format!("[网页变化提醒] {} 页面发生变化", self.label)
    }

    pub fn body(&self) -> String {
        format!(
            "网址 {} 的页面检测到变化，请及时查看。\n检测时间: {}",
            self.url,
            self.detected_at.to_rfc3339()
        )
    }
}
