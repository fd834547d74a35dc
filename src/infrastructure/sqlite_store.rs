use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::warn;

use crate::application::{AppError, AppResult, TargetStore};
use crate::domain::{
    AuthSpec, ChannelConfig, MonitorTarget, RegionRect, RenderParams, ScheduleSpec,
};

/// Configuration store over SQLite. The external admin UI writes the same
/// tables; the engine reads targets/channels and writes run metadata.
#[derive(Clone)]
pub struct SqliteConfigStore {
    pool: SqlitePool,
}

type TargetRow = (
    String,         // id
    Option<String>, // name
    String,         // url
    String,         // schedule_kind
    Option<i64>,    // interval_minutes
    Option<String>, // cron_expr
    i64,            // active
    i64,            // viewport_width
    i64,            // max_height
    i64,            // threshold
    Option<String>, // region (json)
    Option<String>, // auth (json)
    Option<String>, // last_checked (rfc3339)
    Option<String>, // last_changed (rfc3339)
);

const TARGET_COLUMNS: &str = "id, name, url, schedule_kind, interval_minutes, cron_expr, \
     active, viewport_width, max_height, threshold, region, auth, last_checked, last_changed";

impl SqliteConfigStore {
    /// db_url 示例
    /// - "sqlite:/data/pagepulse.db" (docker volume)
    /// - "sqlite:./pagepulse.db"
    pub async fn new(db_url: &str) -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str(db_url)
            .map_err(|e| AppError::Storage(e.to_string()))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> AppResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS targets (
              id TEXT PRIMARY KEY,
              name TEXT,
              url TEXT NOT NULL,
              schedule_kind TEXT NOT NULL,
              interval_minutes INTEGER,
              cron_expr TEXT,
              active INTEGER NOT NULL DEFAULT 1,
              viewport_width INTEGER NOT NULL DEFAULT 1920,
              max_height INTEGER NOT NULL DEFAULT 15000,
              threshold INTEGER NOT NULL DEFAULT 50,
              region TEXT,
              auth TEXT,
              last_checked TEXT,
              last_changed TEXT
            );
          "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Storage(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS channels (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              kind TEXT NOT NULL,
              config TEXT NOT NULL
            );
          "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Storage(e.to_string()))?;

        Ok(())
    }

    /// Seed or update a target row from file configuration. Run metadata
    /// of an existing row is preserved.
    pub async fn upsert_target(&self, target: &MonitorTarget) -> AppResult<()> {
        let (schedule_kind, interval_minutes, cron_expr) = match &target.schedule {
            ScheduleSpec::Interval { minutes } => ("interval", Some(i64::from(*minutes)), None),
            ScheduleSpec::Cron { expr } => ("cron", None, Some(expr.clone())),
        };
        let region = target
            .region
            .map(|r| serde_json::to_string(&r))
            .transpose()
            .map_err(|e| AppError::Storage(e.to_string()))?;
        let auth = serde_json::to_string(&target.auth)
            .map_err(|e| AppError::Storage(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO targets(
              id, name, url, schedule_kind, interval_minutes, cron_expr,
              active, viewport_width, max_height, threshold, region, auth
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
              name=excluded.name, url=excluded.url,
              schedule_kind=excluded.schedule_kind,
              interval_minutes=excluded.interval_minutes,
              cron_expr=excluded.cron_expr, active=excluded.active,
              viewport_width=excluded.viewport_width,
              max_height=excluded.max_height, threshold=excluded.threshold,
              region=excluded.region, auth=excluded.auth
            "#,
        )
        .bind(&target.id)
        .bind(&target.name)
        .bind(&target.url)
        .bind(schedule_kind)
        .bind(interval_minutes)
        .bind(cron_expr)
        .bind(i64::from(target.active))
        .bind(i64::from(target.render.viewport_width))
        .bind(i64::from(target.render.max_height))
        .bind(target.threshold as i64)
        .bind(region)
        .bind(auth)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Storage(e.to_string()))?;

        Ok(())
    }

    /// Replace the whole channel set (startup seeding from file config).
    pub async fn replace_channels(&self, channels: &[ChannelConfig]) -> AppResult<()> {
        sqlx::query("DELETE FROM channels")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;

        for channel in channels {
            let config = serde_json::to_string(channel)
                .map_err(|e| AppError::Storage(e.to_string()))?;
            sqlx::query("INSERT INTO channels(kind, config) VALUES(?, ?)")
                .bind(channel.kind_name())
                .bind(config)
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::Storage(e.to_string()))?;
        }
        Ok(())
    }
}

#[async_trait]
impl TargetStore for SqliteConfigStore {
    async fn get_target(&self, id: &str) -> AppResult<Option<MonitorTarget>> {
        let row: Option<TargetRow> = sqlx::query_as(&format!(
            "SELECT {TARGET_COLUMNS} FROM targets WHERE id = ? LIMIT 1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Storage(e.to_string()))?;

        Ok(row.and_then(target_from_row))
    }

    async fn list_active_targets(&self) -> AppResult<Vec<MonitorTarget>> {
        let rows: Vec<TargetRow> = sqlx::query_as(&format!(
            "SELECT {TARGET_COLUMNS} FROM targets WHERE active = 1 ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Storage(e.to_string()))?;

        Ok(rows.into_iter().filter_map(target_from_row).collect())
    }

    async fn update_run_metadata(
        &self,
        id: &str,
        last_checked: DateTime<Utc>,
        last_changed: Option<DateTime<Utc>>,
    ) -> AppResult<()> {
        sqlx::query(
            "UPDATE targets SET last_checked = ?, last_changed = COALESCE(?, last_changed) \
             WHERE id = ?",
        )
        .bind(last_checked.to_rfc3339())
        .bind(last_changed.map(|t| t.to_rfc3339()))
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Storage(e.to_string()))?;

        Ok(())
    }

    async fn channel_set(&self) -> AppResult<Vec<ChannelConfig>> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT kind, config FROM channels ORDER BY id")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| AppError::Storage(e.to_string()))?;

        let mut channels = Vec::with_capacity(rows.len());
        for (kind, config) in rows {
            match serde_json::from_str::<ChannelConfig>(&config) {
                Ok(channel) => channels.push(channel),
                Err(e) => warn!(kind, error = %e, "unreadable channel config, skipping"),
            }
        }
        Ok(channels)
    }
}

/// Map a row into the domain, degrading invalid pieces instead of failing
/// the whole listing: a bad schedule drops the row, a bad region or auth
/// blob drops just that field.
fn target_from_row(row: TargetRow) -> Option<MonitorTarget> {
    let (
        id,
        name,
        url,
        schedule_kind,
        interval_minutes,
        cron_expr,
        active,
        viewport_width,
        max_height,
        threshold,
        region,
        auth,
        last_checked,
        last_changed,
    ) = row;

    let schedule = match schedule_kind.as_str() {
        "interval" => match interval_minutes {
            Some(m) if m > 0 => ScheduleSpec::Interval { minutes: m as u32 },
            _ => {
                warn!(target_id = %id, "interval schedule without a positive interval, dropping row");
                return None;
            }
        },
        "cron" => match cron_expr {
            Some(expr) if !expr.trim().is_empty() => ScheduleSpec::Cron { expr },
            _ => {
                warn!(target_id = %id, "cron schedule without an expression, dropping row");
                return None;
            }
        },
        other => {
            warn!(target_id = %id, schedule_kind = other, "unknown schedule kind, dropping row");
            return None;
        }
    };

    let region = region.and_then(|raw| match serde_json::from_str::<RegionRect>(&raw) {
        Ok(r) if r.is_well_formed() => Some(r),
        Ok(r) => {
            warn!(target_id = %id, ?r, "degenerate region rectangle, ignoring");
            None
        }
        Err(e) => {
            warn!(target_id = %id, error = %e, "unreadable region, ignoring");
            None
        }
    });

    let auth = auth
        .map(|raw| match serde_json::from_str::<AuthSpec>(&raw) {
            Ok(a) => a,
            Err(e) => {
                warn!(target_id = %id, error = %e, "unreadable auth descriptor, proceeding unauthenticated");
                AuthSpec::None
            }
        })
        .unwrap_or_default();

    Some(MonitorTarget {
        id,
        name,
        url,
        schedule,
        active: active != 0,
        render: RenderParams {
            viewport_width: viewport_width.max(1) as u32,
            max_height: max_height.max(1) as u32,
        },
        threshold: threshold.max(0) as u64,
        region,
        auth,
        last_checked: last_checked.and_then(parse_rfc3339),
        last_changed: last_changed.and_then(parse_rfc3339),
    })
}

fn parse_rfc3339(raw: String) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}
