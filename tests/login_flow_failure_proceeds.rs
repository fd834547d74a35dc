use std::sync::Arc;
use std::time::Duration;

use image::{DynamicImage, Rgba, RgbaImage};

use pagepulse::application::usecases::{CheckRunner, RunOutcome};
use pagepulse::application::RenderGate;
use pagepulse::domain::{AuthSpec, MonitorTarget, RenderParams, ScheduleSpec};
use pagepulse::infrastructure::fake_renderer::FakeRenderer;
use pagepulse::infrastructure::fanout_notifier::NotificationFanout;
use pagepulse::infrastructure::memory_store::{InMemorySnapshotStore, InMemoryTargetStore};

fn frame() -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 255, 255, 255])))
}

fn login_target(id: &str, auth: AuthSpec) -> MonitorTarget {
    MonitorTarget {
        id: id.to_string(),
        name: None,
        url: format!("https://example.com/{id}"),
        schedule: ScheduleSpec::Interval { minutes: 5 },
        active: true,
        render: RenderParams::default(),
        threshold: 500,
        auth,
        region: None,
        last_checked: None,
        last_changed: None,
    }
}

fn credentials() -> AuthSpec {
    AuthSpec::Credentials {
        username: "operator".into(),
        password: "secret".into(),
        username_selector: "#user".into(),
        password_selector: "#pass".into(),
        submit_selector: "#submit".into(),
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

/// Happy path: wait for the username field, fill both fields, submit,
/// settle, capture. Paused time makes the settle delay instant.
#[tokio::test(start_paused = true)]
async fn login_steps_run_in_order() {
    let store = InMemoryTargetStore::new(vec![login_target("t1", credentials())]);
    let snapshots = InMemorySnapshotStore::new();
    let renderer = FakeRenderer::new();
    renderer.push_frame(frame());

    let runner = runner(&store, &snapshots, &renderer);
    assert_eq!(runner.run("t1").await, RunOutcome::Baseline);

    assert_eq!(
        renderer.actions(),
        vec![
            "navigate https://example.com/t1".to_string(),
            "wait_for #user".to_string(),
            "fill #user".to_string(),
            "fill #pass".to_string(),
            "click #submit".to_string(),
        ]
    );
}

/// The username field never appearing is logged and the run captures
/// whatever page state resulted instead of aborting.
#[tokio::test(start_paused = true)]
async fn selector_timeout_still_captures() {
    let store = InMemoryTargetStore::new(vec![login_target("t1", credentials())]);
    let snapshots = InMemorySnapshotStore::new();
    let renderer = FakeRenderer::new();
    renderer.push_frame(frame());
    renderer.set_fail_selector_waits(true);

    let runner = runner(&store, &snapshots, &renderer);
    assert_eq!(runner.run("t1").await, RunOutcome::Baseline);

    // no fill/click after the wait failed
    let actions = renderer.actions();
    assert!(!actions.iter().any(|a| a.starts_with("fill")));
    assert!(!actions.iter().any(|a| a.starts_with("click")));
    assert!(snapshots.stored("t1").is_some());
}

/// Missing selectors degrade the descriptor to no-authentication.
#[tokio::test(start_paused = true)]
async fn incomplete_credentials_degrade_to_unauthenticated() {
    let auth = AuthSpec::Credentials {
        username: "operator".into(),
        password: "secret".into(),
        username_selector: String::new(),
        password_selector: "#pass".into(),
        submit_selector: "#submit".into(),
    };
    let store = InMemoryTargetStore::new(vec![login_target("t1", auth)]);
    let snapshots = InMemorySnapshotStore::new();
    let renderer = FakeRenderer::new();
    renderer.push_frame(frame());

    let runner = runner(&store, &snapshots, &renderer);
    assert_eq!(runner.run("t1").await, RunOutcome::Baseline);

    let actions = renderer.actions();
    assert!(!actions.iter().any(|a| a.starts_with("wait_for")));
    assert!(!actions.iter().any(|a| a.starts_with("fill")));
}
