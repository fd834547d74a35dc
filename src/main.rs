use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use pagepulse::application::usecases::CheckRunner;
use pagepulse::application::{
    ChannelSender, Notifier, PageRenderer, RenderGate, SnapshotStore, TargetStore,
};
use pagepulse::infrastructure::{
    email_sender::EmailSender, fanout_notifier::NotificationFanout,
    fs_snapshot_store::FsSnapshotStore, scheduler::JobScheduler, sqlite_store::SqliteConfigStore,
    telegram_sender::TelegramSender, webdriver_renderer::WebDriverRenderer,
    webhook_sender::WebhookSender,
};
use pagepulse::interfaces::config::Config;
use pagepulse::interfaces::http_api::{build_router, ApiState};

#[derive(Parser, Debug)]
#[command(name = "pagepulse")]
struct Args {
    /// Path to config.yaml
    #[arg(long, default_value = "config.yaml")]
    config: String,

    /// Check a single target once and exit
    #[arg(long)]
    check: Option<String>,

    /// Do not send outbound notifications (log them instead)
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("pagepulse=info".parse().unwrap()),
        )
        .init();
    if dotenvy::dotenv().is_err() {
        let _ = dotenvy::from_path(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env"));
    }
    let args = Args::parse();

    // 1) load config
    let cfg = match Config::load_from_file(&args.config) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Failed to load config {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // 2) build infra
    let store = match SqliteConfigStore::new(&cfg.database_url).await {
        Ok(s) => Arc::new(s),
        Err(e) => {
            tracing::error!("Failed to open config store {}: {}", cfg.database_url, e);
            std::process::exit(1);
        }
    };

    // seed file-declared targets/channels into the store
    match cfg.to_monitor_targets() {
        Ok(targets) => {
            for target in &targets {
                if let Err(e) = store.upsert_target(target).await {
                    tracing::error!(target_id = %target.id, "Failed to seed target: {e}");
                    std::process::exit(1);
                }
            }
        }
        Err(e) => {
            tracing::error!("Invalid targets in config: {e}");
            std::process::exit(1);
        }
    }
    if !cfg.channels.is_empty() {
        if let Err(e) = store.replace_channels(&cfg.channels).await {
            tracing::error!("Failed to seed notification channels: {e}");
            std::process::exit(1);
        }
    }

    let snapshots: Arc<dyn SnapshotStore> = match FsSnapshotStore::new(&cfg.snapshot_dir) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            tracing::error!("Failed to open snapshot dir {}: {}", cfg.snapshot_dir, e);
            std::process::exit(1);
        }
    };

    let renderer: Arc<dyn PageRenderer> = Arc::new(WebDriverRenderer::new(&cfg.webdriver_url));

    // notifiers fanout
    let senders: Vec<Arc<dyn ChannelSender>> = vec![
        Arc::new(EmailSender::new()),
        Arc::new(TelegramSender::new()),
        Arc::new(WebhookSender::new()),
    ];
    if args.dry_run {
        tracing::warn!("--dry-run enabled: notifications are logged, not sent");
    }
    let notifier: Arc<dyn Notifier> = Arc::new(NotificationFanout::new(senders, args.dry_run));

    let gate = RenderGate::new(
        cfg.render_sessions,
        Duration::from_secs(cfg.gate_wait_seconds),
    );

    let runner = Arc::new(CheckRunner::new(
        store.clone() as Arc<dyn TargetStore>,
        snapshots.clone(),
        renderer,
        notifier,
        gate,
    ));

    // 3) one-shot mode
    if let Some(target_id) = args.check {
        let outcome = runner.run(&target_id).await;
        tracing::info!(%target_id, ?outcome, "one-shot check finished");
        return;
    }

    // 4) scheduler + http surface
    let scheduler = Arc::new(JobScheduler::new(
        store.clone() as Arc<dyn TargetStore>,
        runner,
    ));
    if let Err(e) = scheduler.resync().await {
        tracing::error!("Initial scheduler resync failed: {e}");
        std::process::exit(1);
    }

    let router = build_router(ApiState {
        targets: store.clone() as Arc<dyn TargetStore>,
        snapshots,
        scheduler: scheduler.clone(),
        api_token: cfg.api_token.clone(),
    });

    let listener = match tokio::net::TcpListener::bind(&cfg.listen_addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", cfg.listen_addr, e);
            std::process::exit(1);
        }
    };
    tracing::info!(addr = %cfg.listen_addr, "pagepulse started");

    let shutdown = {
        let scheduler = scheduler.clone();
        async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
            scheduler.shutdown().await;
        }
    };

    if let Err(e) = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
    {
        tracing::error!("HTTP server failed: {e}");
        std::process::exit(1);
    }
}
