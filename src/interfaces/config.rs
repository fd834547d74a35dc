use serde::Deserialize;
use tracing::warn;

use crate::domain::{
    AuthSpec, ChannelConfig, MonitorTarget, RegionRect, RenderParams, ScheduleSpec,
};

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: String,
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,
    /// Bearer token for the HTTP surface; unset means no auth.
    pub api_token: Option<String>,
    /// Size of the render-session permit pool. Each permit is one live
    /// browser page, so keep this in line with available memory.
    #[serde(default = "default_render_sessions")]
    pub render_sessions: usize,
    #[serde(default = "default_gate_wait_seconds")]
    pub gate_wait_seconds: u64,
    /// Seeded into the channel set at startup when non-empty.
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
    /// Seeded into the target table at startup (upsert by id).
    #[serde(default)]
    pub targets: Vec<TargetCfg>,
}

#[derive(Debug, Deserialize)]
pub struct TargetCfg {
    pub id: Option<String>,
    pub name: Option<String>,
    pub url: String,
    pub interval_minutes: Option<u32>,
    pub cron: Option<String>,
    pub active: Option<bool>,
    pub viewport_width: Option<u32>,
    pub max_height: Option<u32>,
    pub threshold: Option<u64>,
    pub region: Option<RegionRect>,
    #[serde(default)]
    pub auth: AuthSpec,
}

impl Config {
    pub fn load_from_file(path: &str) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let raw = expand_env(&raw);
        let cfg: Config = serde_yaml::from_str(&raw)?;
        Ok(cfg)
    }

    pub fn to_monitor_targets(&self) -> anyhow::Result<Vec<MonitorTarget>> {
        let mut out = Vec::new();

        for t in &self.targets {
            let schedule = match (t.interval_minutes, &t.cron) {
                (Some(minutes), None) => ScheduleSpec::Interval { minutes },
                (None, Some(expr)) => ScheduleSpec::Cron { expr: expr.clone() },
                (Some(_), Some(_)) => anyhow::bail!(
                    "target {}: interval_minutes and cron are mutually exclusive",
                    t.url
                ),
                (None, None) => anyhow::bail!(
                    "target {}: needs either interval_minutes or cron",
                    t.url
                ),
            };

            let id = t.id.clone().unwrap_or_else(|| target_id_from_url(&t.url));

            // validate the rectangle at the write boundary, not on every read
            let region = t.region.filter(|r| {
                if r.is_well_formed() {
                    true
                } else {
                    warn!(target_id = %id, ?r, "degenerate region rectangle in config, ignoring");
                    false
                }
            });

            let defaults = RenderParams::default();
            out.push(MonitorTarget {
                id,
                name: t.name.clone(),
                url: t.url.clone(),
                schedule,
                active: t.active.unwrap_or(true),
                render: RenderParams {
                    viewport_width: t.viewport_width.unwrap_or(defaults.viewport_width),
                    max_height: t.max_height.unwrap_or(defaults.max_height),
                },
                threshold: t.threshold.unwrap_or(50),
                region,
                auth: t.auth.clone(),
                last_checked: None,
                last_changed: None,
            });
        }
        Ok(out)
    }
}

/// Stable id derived from the URL when the operator does not pick one.
fn target_id_from_url(url: &str) -> String {
    url.trim_start_matches("https://")
        .trim_start_matches("http://")
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// very small ${VAR} expansion to keep config simple
fn expand_env(s: &str) -> String {
    let mut out = s.to_string();
    for (k, v) in std::env::vars() {
        out = out.replace(&format!("${{{}}}", k), &v);
    }
    out
}

fn default_listen_addr() -> String {
    "0.0.0.0:5000".to_string()
}

fn default_database_url() -> String {
    "sqlite:./pagepulse.db".to_string()
}

fn default_snapshot_dir() -> String {
    "./snapshots".to_string()
}

fn default_webdriver_url() -> String {
    "http://localhost:9515".to_string()
}

fn default_render_sessions() -> usize {
    2
}

fn default_gate_wait_seconds() -> u64 {
    30
}
