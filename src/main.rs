use std::sync::Arc;

use tracing::{error, info};

use roomsched::config::{link_doctors, load_users, register_users, Config};
use roomsched::engine::{now_ms, Engine};
use roomsched::monitor::{run_monitor, ExpirationMonitor};
use roomsched::notify::NotifyHub;
use roomsched::sync::{SyncOutcome, Synchronizer};
use roomsched::timetable::TimetableSource;
use roomsched::background;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    roomsched::observability::init(config.metrics_port)?;

    // Ensure data directory exists
    std::fs::create_dir_all(&config.data_dir)?;

    let engine = Arc::new(Engine::new(config.wal_path())?);
    let users = match &config.users_path {
        Some(path) => {
            let users = load_users(path)?;
            // Before the sync pass, which needs its front-desk owner.
            let written = register_users(&engine, &users).await?;
            info!("{} users from {}, {written} updated", users.len(), path.display());
            users
        }
        None => Vec::new(),
    };

    let source = TimetableSource::File(config.timetable_path.clone());
    // Fail fast on a malformed timetable; later passes re-read it.
    source.load()?;
    let sync = Arc::new(Synchronizer::new(engine.clone(), source, config.timezone).await);

    info!("roomsched starting");
    info!("  data_dir: {}", config.data_dir.display());
    info!("  timetable: {}", config.timetable_path.display());
    info!("  timezone: {}", config.timezone);
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    match sync.sync(now_ms(), true).await {
        Ok(SyncOutcome::Completed(report)) => info!("initial sync: {report:?}"),
        Ok(SyncOutcome::Skipped) => {}
        // Logged by the synchronizer; the refresher retries.
        Err(_) => error!("initial sync failed, continuing"),
    }

    // Doctor accounts can be linked now that the timetable's doctors exist.
    link_doctors(&engine, &users).await?;

    let hub = Arc::new(NotifyHub::new());
    let monitor = Arc::new(ExpirationMonitor::new(engine.clone(), hub, config.timezone));

    let tasks = [
        tokio::spawn(run_monitor(monitor)),
        tokio::spawn(background::run_sync_refresher(sync.clone(), config.sync_refresh)),
        tokio::spawn(background::run_compactor(engine.clone(), config.compact_threshold)),
    ];

    // Graceful shutdown on SIGTERM/ctrl-c
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }

    info!("shutdown signal received, stopping background tasks");
    for task in tasks {
        task.abort();
    }
    // Every acknowledged write is already fsynced; compact so the next start replays less.
    if let Err(e) = engine.compact_wal().await {
        error!("final compaction failed: {e}");
    }
    info!("roomsched stopped");
    Ok(())
}
