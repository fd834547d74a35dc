use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::{DynamicImage, Rgba, RgbaImage};

use pagepulse::application::usecases::{CheckRunner, RunOutcome};
use pagepulse::application::{AppResult, ChannelSender, RenderGate};
use pagepulse::domain::compare;
use pagepulse::domain::{
    AuthSpec, ChangeNotice, ChannelConfig, MonitorTarget, RenderParams, ScheduleSpec,
};
use pagepulse::infrastructure::fake_renderer::FakeRenderer;
use pagepulse::infrastructure::fanout_notifier::NotificationFanout;
use pagepulse::infrastructure::memory_store::{InMemorySnapshotStore, InMemoryTargetStore};

#[derive(Clone)]
struct CountingSender {
    kind: &'static str,
    count: Arc<Mutex<u32>>,
}

impl CountingSender {
    fn new(kind: &'static str) -> Self {
        Self {
            kind,
            count: Arc::new(Mutex::new(0)),
        }
    }

    fn get(&self) -> u32 {
        *self.count.lock().unwrap()
    }
}

#[async_trait]
impl ChannelSender for CountingSender {
    fn kind(&self) -> &'static str {
        self.kind
    }

    async fn send(&self, _config: &ChannelConfig, _notice: &ChangeNotice) -> AppResult<()> {
        *self.count.lock().unwrap() += 1;
        Ok(())
    }
}

fn solid(rgb: [u8; 3]) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(
        10,
        10,
        Rgba([rgb[0], rgb[1], rgb[2], 255]),
    ))
}

fn interval_target(id: &str, threshold: u64) -> MonitorTarget {
    MonitorTarget {
        id: id.to_string(),
        name: Some("示例页面".to_string()),
        url: format!("https://example.com/{id}"),
        schedule: ScheduleSpec::Interval { minutes: 5 },
        active: true,
        render: RenderParams::default(),
        threshold,
        auth: AuthSpec::None,
        region: None,
        last_checked: None,
        last_changed: None,
    }
}

/// interval=5m, no region, threshold=500: baseline run, identical run,
/// then a run whose difference sum exceeds the threshold.
#[tokio::test]
async fn three_run_sequence_notifies_exactly_once_per_channel() {
    let store = InMemoryTargetStore::new(vec![interval_target("t1", 500)]);
    store.set_channels(vec![
        ChannelConfig::Telegram {
            bot_token: "token".into(),
            chat_id: "42".into(),
        },
        ChannelConfig::Webhook {
            url: "https://hooks.example.com/pagepulse".into(),
        },
        // 必填字段为空 => 未配置, 应被跳过
        ChannelConfig::Telegram {
            bot_token: String::new(),
            chat_id: "43".into(),
        },
    ]);

    let snapshots = InMemorySnapshotStore::new();
    let renderer = FakeRenderer::new();
    let white = solid([255, 255, 255]);
    let black = solid([0, 0, 0]);
    renderer.push_frame(white.clone());
    renderer.push_frame(white.clone());
    renderer.push_frame(black.clone());

    let telegram = CountingSender::new("telegram");
    let webhook = CountingSender::new("webhook");
    let notifier = NotificationFanout::new(
        vec![Arc::new(telegram.clone()), Arc::new(webhook.clone())],
        false,
    );

    let runner = CheckRunner::new(
        Arc::new(store.clone()),
        Arc::new(snapshots.clone()),
        Arc::new(renderer),
        Arc::new(notifier),
        RenderGate::new(2, Duration::from_secs(1)),
    );

    // run 1: baseline
    assert_eq!(runner.run("t1").await, RunOutcome::Baseline);
    assert_eq!(telegram.get(), 0);

    // run 2: identical rendering, snapshot replaced, still quiet
    assert_eq!(runner.run("t1").await, RunOutcome::Unchanged);
    assert_eq!(telegram.get(), 0);
    assert_eq!(webhook.get(), 0);
    assert!(store.snapshot_of("t1").unwrap().last_changed.is_none());

    // run 3: white -> black exceeds threshold 500 by a wide margin
    assert_eq!(runner.run("t1").await, RunOutcome::Changed);
    assert_eq!(telegram.get(), 1);
    assert_eq!(webhook.get(), 1);

    let row = store.snapshot_of("t1").unwrap();
    assert!(row.last_changed.is_some());
    assert_eq!(row.last_checked, row.last_changed);

    // snapshot now holds the latest rendering
    let stored = snapshots.stored("t1").unwrap();
    assert!(!compare::differs(&stored, &black, 0));
}

/// A change below the threshold replaces the snapshot but stays quiet.
#[tokio::test]
async fn sub_threshold_difference_is_unchanged() {
    let store = InMemoryTargetStore::new(vec![interval_target("t1", 500)]);
    store.set_channels(vec![ChannelConfig::Webhook {
        url: "https://hooks.example.com/pagepulse".into(),
    }]);

    let snapshots = InMemorySnapshotStore::new();
    let renderer = FakeRenderer::new();
    let base = solid([255, 255, 255]);
    // one pixel, delta 100: sum far below 500
    let mut tweaked = base.to_rgba8();
    tweaked.put_pixel(0, 0, Rgba([155, 255, 255, 255]));
    renderer.push_frame(base);
    renderer.push_frame(DynamicImage::ImageRgba8(tweaked));

    let webhook = CountingSender::new("webhook");
    let notifier = NotificationFanout::new(vec![Arc::new(webhook.clone())], false);

    let runner = CheckRunner::new(
        Arc::new(store.clone()),
        Arc::new(snapshots.clone()),
        Arc::new(renderer),
        Arc::new(notifier),
        RenderGate::new(2, Duration::from_secs(1)),
    );

    assert_eq!(runner.run("t1").await, RunOutcome::Baseline);
    assert_eq!(runner.run("t1").await, RunOutcome::Unchanged);
    assert_eq!(webhook.get(), 0);
    assert!(store.snapshot_of("t1").unwrap().last_changed.is_none());
}

/// A degenerate region rectangle must not fail the run; the comparison
/// silently covers the full frame instead.
#[tokio::test]
async fn degenerate_region_compares_full_frame() {
    let mut target = interval_target("t1", 500);
    target.region = Some(pagepulse::domain::RegionRect {
        left: 10,
        top: 0,
        right: 5, // right <= left
        bottom: 20,
    });
    let store = InMemoryTargetStore::new(vec![target]);
    store.set_channels(vec![ChannelConfig::Webhook {
        url: "https://hooks.example.com/pagepulse".into(),
    }]);

    let snapshots = InMemorySnapshotStore::new();
    let renderer = FakeRenderer::new();
    renderer.push_frame(solid([255, 255, 255]));
    renderer.push_frame(solid([0, 0, 0]));

    let webhook = CountingSender::new("webhook");
    let notifier = NotificationFanout::new(vec![Arc::new(webhook.clone())], false);

    let runner = CheckRunner::new(
        Arc::new(store),
        Arc::new(snapshots),
        Arc::new(renderer),
        Arc::new(notifier),
        RenderGate::new(2, Duration::from_secs(1)),
    );

    assert_eq!(runner.run("t1").await, RunOutcome::Baseline);
    // full-frame white -> black is well above the threshold
    assert_eq!(runner.run("t1").await, RunOutcome::Changed);
    assert_eq!(webhook.get(), 1);
}

/// A failing channel must not block the others.
#[tokio::test]
async fn failing_channel_does_not_block_others() {
    struct FailingSender;

    #[async_trait]
    impl ChannelSender for FailingSender {
        fn kind(&self) -> &'static str {
            "telegram"
        }

        async fn send(&self, _config: &ChannelConfig, _notice: &ChangeNotice) -> AppResult<()> {
            Err(pagepulse::application::AppError::Notifier(
                "simulated transport failure".into(),
            ))
        }
    }

    let store = InMemoryTargetStore::new(vec![interval_target("t1", 500)]);
    store.set_channels(vec![
        ChannelConfig::Telegram {
            bot_token: "token".into(),
            chat_id: "42".into(),
        },
        ChannelConfig::Webhook {
            url: "https://hooks.example.com/pagepulse".into(),
        },
    ]);

    let snapshots = InMemorySnapshotStore::new();
    let renderer = FakeRenderer::new();
    renderer.push_frame(solid([255, 255, 255]));
    renderer.push_frame(solid([0, 0, 0]));

    let webhook = CountingSender::new("webhook");
    let notifier = NotificationFanout::new(
        vec![Arc::new(FailingSender), Arc::new(webhook.clone())],
        false,
    );

    let runner = CheckRunner::new(
        Arc::new(store.clone()),
        Arc::new(snapshots),
        Arc::new(renderer),
        Arc::new(notifier),
        RenderGate::new(2, Duration::from_secs(1)),
    );

    assert_eq!(runner.run("t1").await, RunOutcome::Baseline);
    // the telegram failure is isolated; the run still counts as changed
    assert_eq!(runner.run("t1").await, RunOutcome::Changed);
    assert_eq!(webhook.get(), 1);
    assert!(store.snapshot_of("t1").unwrap().last_changed.is_some());
}
