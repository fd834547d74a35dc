use std::sync::Arc;
use std::time::Duration;

use image::{DynamicImage, Rgba, RgbaImage};

use pagepulse::application::usecases::{CheckRunner, RunOutcome};
use pagepulse::application::RenderGate;
use pagepulse::domain::compare;
use pagepulse::domain::{AuthSpec, MonitorTarget, RenderParams, ScheduleSpec};
use pagepulse::infrastructure::fake_renderer::FakeRenderer;
use pagepulse::infrastructure::fanout_notifier::NotificationFanout;
use pagepulse::infrastructure::memory_store::{InMemorySnapshotStore, InMemoryTargetStore};

fn solid(rgb: [u8; 3]) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(
        10,
        10,
        Rgba([rgb[0], rgb[1], rgb[2], 255]),
    ))
}

fn target(id: &str) -> MonitorTarget {
    MonitorTarget {
        id: id.to_string(),
        name: None,
        url: format!("https://example.com/{id}"),
        schedule: ScheduleSpec::Interval { minutes: 5 },
        active: true,
        render: RenderParams::default(),
        threshold: 500,
        auth: AuthSpec::None,
        region: None,
        last_checked: None,
        last_changed: None,
    }
}

fn runner(
    store: &InMemoryTargetStore,
    snapshots: &InMemorySnapshotStore,
    renderer: &FakeRenderer,
) -> CheckRunner {
    CheckRunner::new(
        Arc::new(store.clone()),
        Arc::new(snapshots.clone()),
        Arc::new(renderer.clone()),
        Arc::new(NotificationFanout::new(vec![], false)),
        RenderGate::new(2, Duration::from_secs(1)),
    )
}

/// A render timeout aborts the run without touching stored state: the
/// target keeps its old last_checked and its old snapshot, so the next
/// scheduled trigger retries naturally.
#[tokio::test]
async fn render_timeout_leaves_state_untouched() {
    let store = InMemoryTargetStore::new(vec![target("t1")]);
    let snapshots = InMemorySnapshotStore::new();
    let renderer = FakeRenderer::new();
    let white = solid([255, 255, 255]);
    renderer.push_frame(white.clone());

    let runner = runner(&store, &snapshots, &renderer);

    assert_eq!(runner.run("t1").await, RunOutcome::Baseline);
    let checked_after_baseline = store.snapshot_of("t1").unwrap().last_checked;
    assert!(checked_after_baseline.is_some());

    // 渲染失败: 不得更新 last_checked, 不得动快照
    renderer.set_fail_captures(true);
    assert_eq!(runner.run("t1").await, RunOutcome::Failed);

    let row = store.snapshot_of("t1").unwrap();
    assert_eq!(row.last_checked, checked_after_baseline);
    let stored = snapshots.stored("t1").unwrap();
    assert!(!compare::differs(&stored, &white, 0));
}

/// A snapshot that cannot be persisted surfaces as a failed run; marking
/// the target as checked would silently lose the comparison baseline.
#[tokio::test]
async fn snapshot_write_failure_fails_the_run() {
    let store = InMemoryTargetStore::new(vec![target("t1")]);
    let snapshots = InMemorySnapshotStore::new();
    let renderer = FakeRenderer::new();
    renderer.set_default_frame(solid([255, 255, 255]));

    let runner = runner(&store, &snapshots, &renderer);

    snapshots.set_fail_writes(true);
    assert_eq!(runner.run("t1").await, RunOutcome::Failed);
    assert!(store.snapshot_of("t1").unwrap().last_checked.is_none());
    assert!(snapshots.stored("t1").is_none());

    // storage recovers, the next trigger baselines as usual
    snapshots.set_fail_writes(false);
    assert_eq!(runner.run("t1").await, RunOutcome::Baseline);
    assert!(store.snapshot_of("t1").unwrap().last_checked.is_some());
}

/// Render sessions close on every exit path, including failed captures.
#[tokio::test]
async fn failed_runs_do_not_leak_sessions() {
    let store = InMemoryTargetStore::new(vec![target("t1")]);
    let snapshots = InMemorySnapshotStore::new();
    let renderer = FakeRenderer::new();
    renderer.set_fail_captures(true);

    let runner = runner(&store, &snapshots, &renderer);
    for _ in 0..3 {
        assert_eq!(runner.run("t1").await, RunOutcome::Failed);
    }
    assert_eq!(renderer.open_sessions(), 0);
}
