//! Valet application binary - composition root.
//!
//! Ties together all valet crates into a single executable:
//! 1. Parse CLI arguments and load TOML configuration
//! 2. Initialize storage (SQLite, WAL mode) and run migrations
//! 3. Wire the engine: policy, executors, services, notification fan-out
//! 4. Start background tasks (email outbox, notification purge)
//! 5. Start the axum REST API server
//!
//! Ctrl-c stops the server; the outbox drains its queue and the WAL is
//! checkpointed before exit.

mod cli;

use std::sync::Arc;

use clap::Parser;
use tokio::sync::{mpsc, Notify};

use valet_api::auth;
use valet_api::routes;
use valet_api::state::AppState;
use valet_core::config::ValetConfig;
use valet_core::types::Timestamp;
use valet_engine::{ActionEngine, ExecutorRegistry, PolicyResolver};
use valet_notify::{LogTransport, NotificationDispatcher, Notifier, OutboxWorker};
use valet_services::{InMemoryServices, ServiceFactory};
use valet_store::{
    ActionRepository, Database, NotificationRepository, PrefsRepository, SettingsRepository,
};

use cli::CliArgs;

/// Delete expired notification rows on a fixed cadence.
async fn purge_loop(notifications: Arc<NotificationRepository>, interval_hours: u64) {
    let period = tokio::time::Duration::from_secs(interval_hours.max(1) * 3600);
    let mut interval = tokio::time::interval(period);

    loop {
        interval.tick().await;
        match notifications.purge_expired(Timestamp::now()) {
            Ok(0) => {}
            Ok(n) => tracing::info!(purged = n, "Expired notifications removed"),
            Err(e) => tracing::warn!(error = %e, "Notification purge failed"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config first: the log filter falls back to its level.
    let config_file = args.resolve_config_path();
    let config = ValetConfig::load_or_default(&config_file);

    // Tracing. RUST_LOG wins when set.
    let log_level = args.resolve_log_level(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    tracing::info!("Starting valet v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    // First run: write the defaults out so there is a file to edit.
    if !config_file.exists() {
        if let Err(e) = config.save(&config_file) {
            tracing::warn!(error = %e, "Could not write initial config file");
        }
    }

    let data_dir = cli::resolve_data_dir(&config.general.data_dir);
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }

    // API token: explicit flag or env wins, otherwise the persisted file
    // (generated on first run).
    let api_token = match args.resolve_token() {
        Some(token) => token,
        None => auth::load_or_generate_token(&data_dir.join("api_token")),
    };

    if args.print_token {
        println!("{}", api_token);
        return Ok(());
    }

    // Storage.
    let db_path = args.resolve_db_path(&data_dir);
    let db = Arc::new(Database::new(&db_path)?);

    let actions = Arc::new(ActionRepository::new(db.clone()));
    let settings = Arc::new(SettingsRepository::new(db.clone()));
    let notifications = Arc::new(NotificationRepository::new(db.clone()));
    let prefs = Arc::new(PrefsRepository::new(db.clone()));

    // Notification fan-out: in-app rows, background email, push stub.
    let (outbox_tx, outbox_rx) = mpsc::channel(config.notify.email_queue_capacity.max(1));
    let notifier: Arc<dyn Notifier> = Arc::new(NotificationDispatcher::new(
        notifications.clone(),
        prefs,
        outbox_tx,
        config.notify.max_per_minute,
    ));

    let outbox_shutdown = Arc::new(Notify::new());
    let outbox_handle = tokio::spawn(
        OutboxWorker::new(outbox_rx, Arc::new(LogTransport), outbox_shutdown.clone()).run(),
    );

    let purge_notifications = notifications.clone();
    let purge_hours = config.notify.purge_interval_hours;
    tokio::spawn(async move {
        purge_loop(purge_notifications, purge_hours).await;
    });

    // Engine over in-memory service backends; real integrations plug in
    // behind the same ServiceFactory seam.
    let services = Arc::new(InMemoryServices::new());
    let factory: Arc<dyn ServiceFactory> = services;
    let engine = Arc::new(ActionEngine::new(
        actions.clone(),
        PolicyResolver::new(settings.clone()),
        ExecutorRegistry::with_defaults(factory),
        notifier,
    ));
    let policy = Arc::new(PolicyResolver::new(settings.clone()));

    let port = args.resolve_port(config.api.port);
    let state = AppState::new(
        engine,
        policy,
        settings,
        notifications,
        actions,
        api_token,
        port,
        config.api.max_body_kb,
    );

    // Serves until ctrl-c.
    routes::start_server(state).await?;

    tracing::info!("Shutting down");
    outbox_shutdown.notify_one();
    let _ = outbox_handle.await;
    db.checkpoint()?;

    Ok(())
}
