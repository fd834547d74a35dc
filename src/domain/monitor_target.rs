use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AuthSpec, RegionRect, RenderParams, ScheduleSpec};

/// One monitored page. Mutated by configuration writes and, for the two
/// timestamps, by the check executor after each run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MonitorTarget {
    pub id: String, // stable id, e.g. "news-frontpage"
    pub name: Option<String>,
    pub url: String,
    pub schedule: ScheduleSpec,
    pub active: bool,
    pub render: RenderParams,
    /// Pixel-difference-sum units; higher means less sensitive.
    pub threshold: u64,
    pub region: Option<RegionRect>,
    pub auth: AuthSpec,
    pub last_checked: Option<DateTime<Utc>>,
    pub last_changed: Option<DateTime<Utc>>,
}

impl MonitorTarget {
    /// Display name for logs and notifications, falling back to the URL.
    pub fn label(&self) -> &str {
        match &self.name {
            Some(n) if !n.is_empty() => n,
            _ => &self.url,
        }
    }
}
