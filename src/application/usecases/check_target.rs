use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use image::DynamicImage;
use tracing::{error, info, warn};

use crate::application::gate::RenderGate;
use crate::application::{
    AppResult, Notifier, PageRenderer, RenderSession, SnapshotStore, TargetStore,
};
use crate::domain::{compare, AuthSpec, ChangeNotice, MonitorTarget};

/// How long the login flow waits for the username field to appear.
const LOGIN_FIELD_WAIT: Duration = Duration::from_secs(10);
/// Fixed settle delay after submitting the login form.
const LOGIN_SETTLE: Duration = Duration::from_secs(3);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// First capture for this target; stored as the comparison baseline.
    Baseline,
    Unchanged,
    Changed,
    /// No render slot freed up within the gate wait.
    SkippedBusy,
    /// Target vanished between scheduling and firing.
    SkippedMissing,
    Failed,
}

/// Executes one target's full check cycle: render, optionally
/// authenticate, capture, compare against the stored snapshot, persist,
/// notify. Shared by the scheduler jobs and the manual trigger surface.
pub struct CheckRunner {
    targets: Arc<dyn TargetStore>,
    snapshots: Arc<dyn SnapshotStore>,
    renderer: Arc<dyn PageRenderer>,
    notifier: Arc<dyn Notifier>,
    gate: RenderGate,
    // 同一个 target 的手动触发和定时触发串行执行, 避免交错覆盖快照
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl CheckRunner {
    pub fn new(
        targets: Arc<dyn TargetStore>,
        snapshots: Arc<dyn SnapshotStore>,
        renderer: Arc<dyn PageRenderer>,
        notifier: Arc<dyn Notifier>,
        gate: RenderGate,
    ) -> Self {
        Self {
            targets,
            snapshots,
            renderer,
            notifier,
            gate,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Run one check for `target_id`. Every failure path is caught and
    /// logged here; a run never takes the scheduler down with it.
    pub async fn run(&self, target_id: &str) -> RunOutcome {
        let lock = self.target_lock(target_id);
        let _serial = lock.lock().await;

        let target = match self.targets.get_target(target_id).await {
            Ok(Some(t)) => t,
            Ok(None) => {
                // expected: the row may have been deleted after scheduling
                warn!(target_id, "target no longer exists, skipping run");
                return RunOutcome::SkippedMissing;
            }
            Err(e) => {
                error!(target_id, error = %e, "could not load target");
                return RunOutcome::Failed;
            }
        };

        let Some(_permit) = self.gate.acquire().await else {
            warn!(target_id, url = %target.url, "render slots busy, run skipped");
            return RunOutcome::SkippedBusy;
        };

        match self.check(&target).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(target_id, url = %target.url, error = %e, "check run failed");
                RunOutcome::Failed
            }
        }
    }

    async fn check(&self, target: &MonitorTarget) -> AppResult<RunOutcome> {
        let current = self.render(target).await?;
        let prior = self.snapshots.get(&target.id).await?;
        let now = Utc::now();

        let Some(prior) = prior else {
            // baseline case: nothing to compare against yet
            self.snapshots.put(&target.id, &current).await?;
            self.targets.update_run_metadata(&target.id, now, None).await?;
            info!(target_id = %target.id, url = %target.url, "baseline snapshot stored");
            return Ok(RunOutcome::Baseline);
        };

        let region = match target.region {
            Some(r) if !r.is_well_formed() => {
                warn!(target_id = %target.id, ?r, "degenerate region rectangle, comparing full frame");
                None
            }
            other => other,
        };
        let changed = compare::differs_in_region(&prior, &current, target.threshold, region);

        // the new raster must be persisted before last_checked may advance,
        // otherwise a storage failure would silently lose the baseline
        self.snapshots.put(&target.id, &current).await?;
        self.targets
            .update_run_metadata(&target.id, now, changed.then_some(now))
            .await?;

        if !changed {
            info!(target_id = %target.id, url = %target.url, "no visible change");
            return Ok(RunOutcome::Unchanged);
        }

        info!(target_id = %target.id, url = %target.url, "change detected");
        let notice = ChangeNotice {
            target_id: target.id.clone(),
            label: target.label().to_string(),
            url: target.url.clone(),
            detected_at: now,
        };
        match self.targets.channel_set().await {
            Ok(channels) => {
                if let Err(e) = self.notifier.notify(&notice, &channels).await {
                    warn!(target_id = %target.id, error = %e, "notification fan-out reported failure");
                }
            }
            Err(e) => {
                warn!(target_id = %target.id, error = %e, "could not load notification channels");
            }
        }
        Ok(RunOutcome::Changed)
    }

    /// Open a session, drive it to a captured raster, and close it on
    /// every path, success or not.
    async fn render(&self, target: &MonitorTarget) -> AppResult<DynamicImage> {
        let session = self
            .renderer
            .open(target.render.viewport_width, target.render.max_height)
            .await?;
        let result = Self::drive(session.as_ref(), target).await;
        if let Err(e) = session.close().await {
            warn!(target_id = %target.id, error = %e, "render session close failed");
        }
        result
    }

    async fn drive(
        session: &dyn RenderSession,
        target: &MonitorTarget,
    ) -> AppResult<DynamicImage> {
        session.navigate(&target.url).await?;

        match &target.auth {
            AuthSpec::None => {}
            auth if !auth.is_complete() => {
                warn!(
                    target_id = %target.id,
                    "auth descriptor incomplete, proceeding unauthenticated"
                );
            }
            AuthSpec::Cookies { cookies } => {
                let normalized: Vec<_> = cookies.iter().map(|c| c.normalized()).collect();
                match session.inject_cookies(&normalized).await {
                    Ok(()) => {
                        if let Err(e) = session.reload().await {
                            warn!(target_id = %target.id, error = %e, "reload after cookie injection failed");
                        }
                    }
                    Err(e) => {
                        // proceed unauthenticated rather than aborting
                        warn!(target_id = %target.id, error = %e, "cookie injection failed");
                    }
                }
            }
            AuthSpec::Credentials {
                username,
                password,
                username_selector,
                password_selector,
                submit_selector,
            } => {
                if let Err(e) = Self::login(
                    session,
                    username,
                    password,
                    username_selector,
                    password_selector,
                    submit_selector,
                )
                .await
                {
                    // capture whatever page state resulted
                    warn!(target_id = %target.id, error = %e, "login flow failed, capturing current page state");
                }
            }
        }

        session.capture().await
    }

    async fn login(
        session: &dyn RenderSession,
        username: &str,
        password: &str,
        username_selector: &str,
        password_selector: &str,
        submit_selector: &str,
    ) -> AppResult<()> {
        session.wait_for(username_selector, LOGIN_FIELD_WAIT).await?;
        session.fill(username_selector, username).await?;
        session.fill(password_selector, password).await?;
        session.click(submit_selector).await?;
        tokio::time::sleep(LOGIN_SETTLE).await;
        Ok(())
    }

    fn target_lock(&self, target_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(target_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}
