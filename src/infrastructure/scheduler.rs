use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use cron::Schedule;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::application::usecases::CheckRunner;
use crate::application::{AppResult, TargetStore};
use crate::domain::ScheduleSpec;

/// Keeps the set of running check jobs consistent with the configuration
/// store. One job per target id; `resync` discards the whole set and
/// rebuilds it from the current rows, so scheduler state can never drift
/// from configuration.
pub struct JobScheduler {
    targets: Arc<dyn TargetStore>,
    runner: Arc<CheckRunner>,
    // 整个重建过程持锁, 并发 resync 不会交错出半新半旧的任务集
    jobs: tokio::sync::Mutex<HashMap<String, ScheduledJob>>,
}

struct ScheduledJob {
    trigger: String,
    handle: JoinHandle<()>,
}

enum Trigger {
    Every(Duration),
    Calendar(Box<Schedule>),
}

impl JobScheduler {
    pub fn new(targets: Arc<dyn TargetStore>, runner: Arc<CheckRunner>) -> Self {
        Self {
            targets,
            runner,
            jobs: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Rebuild the job set from the store: abort every current job, then
    /// register one job per active target with a parseable schedule.
    /// Safe to call repeatedly; unchanged configuration yields the same
    /// job set every time.
    pub async fn resync(&self) -> AppResult<()> {
        let mut jobs = self.jobs.lock().await;
        let targets = self.targets.list_active_targets().await?;

        for (_, job) in jobs.drain() {
            job.handle.abort();
        }

        for target in targets {
            let trigger = match parse_trigger(&target.schedule) {
                Ok(t) => t,
                Err(reason) => {
                    warn!(target_id = %target.id, %reason, "invalid schedule, target not scheduled");
                    continue;
                }
            };
            let description = target.schedule.describe();
            let handle = self.spawn_job(target.id.clone(), trigger);
            jobs.insert(
                target.id,
                ScheduledJob {
                    trigger: description,
                    handle,
                },
            );
        }

        info!(jobs = jobs.len(), "scheduler resynced");
        Ok(())
    }

    fn spawn_job(&self, target_id: String, trigger: Trigger) -> JoinHandle<()> {
        let runner = self.runner.clone();
        tokio::spawn(async move {
            match trigger {
                Trigger::Every(period) => loop {
                    tokio::time::sleep(period).await;
                    runner.run(&target_id).await;
                },
                Trigger::Calendar(schedule) => loop {
                    let now = Utc::now();
                    let Some(next) = schedule.upcoming(Utc).next() else {
                        // schedule has no future fire times (e.g. a fixed date in the past)
                        warn!(target_id = %target_id, "cron schedule exhausted, job stopping");
                        break;
                    };
                    let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
                    tokio::time::sleep(wait).await;
                    runner.run(&target_id).await;
                },
            }
        })
    }

    /// Manual "check now": same executor contract, outside the schedule.
    pub fn run_now(&self, target_id: &str) {
        let runner = self.runner.clone();
        let target_id = target_id.to_string();
        tokio::spawn(async move {
            runner.run(&target_id).await;
        });
    }

    /// Current (target id, trigger description) pairs, sorted by id.
    pub async fn job_descriptions(&self) -> Vec<(String, String)> {
        let jobs = self.jobs.lock().await;
        let mut out: Vec<_> = jobs
            .iter()
            .map(|(id, job)| (id.clone(), job.trigger.clone()))
            .collect();
        out.sort();
        out
    }

    pub async fn shutdown(&self) {
        let mut jobs = self.jobs.lock().await;
        for (_, job) in jobs.drain() {
            job.handle.abort();
        }
        info!("scheduler stopped");
    }
}

fn parse_trigger(spec: &ScheduleSpec) -> Result<Trigger, String> {
    match spec {
        ScheduleSpec::Interval { minutes: 0 } => Err("interval must be at least one minute".into()),
        ScheduleSpec::Interval { minutes } => {
            Ok(Trigger::Every(Duration::from_secs(u64::from(*minutes) * 60)))
        }
        ScheduleSpec::Cron { expr } => Schedule::from_str(&normalize_cron(expr))
            .map(|s| Trigger::Calendar(Box::new(s)))
            .map_err(|e| e.to_string()),
    }
}

/// The cron crate wants a seconds field; classic 5-field expressions (what
/// admin UIs store) get one prepended. 6/7-field pass through unchanged.
fn normalize_cron(expr: &str) -> String {
    let trimmed = expr.trim();
    if trimmed.split_whitespace().count() == 5 {
        format!("0 {trimmed}")
    } else {
        trimmed.to_string()
    }
}
