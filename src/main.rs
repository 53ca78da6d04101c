use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use roomkeep::clock::SystemClock;
use roomkeep::config::Config;
use roomkeep::engine::{Engine, EngineError, ValidationError};
use roomkeep::model::NewRoom;
use roomkeep::notify::NotifyHub;
use roomkeep::store::DurableStore;
use roomkeep::sweeper;

/// Add each room from the JSON array at `path` whose number is not yet known.
async fn seed_rooms(engine: &Engine, path: &Path) -> Result<usize, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)?;
    let rooms: Vec<NewRoom> = serde_json::from_str(&raw)?;
    let mut added = 0;
    for room in rooms {
        let number = room.room_number.clone();
        match engine.add_room(room).await {
            Ok(_) => added += 1,
            Err(EngineError::Validation(ValidationError::DuplicateRoomNumber(_))) => {}
            Err(e) => warn!("seed room {number} skipped: {e}"),
        }
    }
    Ok(added)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env();
    roomkeep::observability::init(config.metrics_port)?;

    std::fs::create_dir_all(&config.data_dir)?;
    let store = Arc::new(DurableStore::open(&config.wal_path())?);
    let clock = Arc::new(SystemClock::new(config.utc_offset));
    let engine = Arc::new(Engine::new(store.clone(), clock, Arc::new(NotifyHub::new())).await?);

    if let Some(path) = &config.seed_rooms {
        let added = seed_rooms(&engine, path).await?;
        info!("seeded {added} rooms from {}", path.display());
    }

    let report = engine.reconcile_all().await?;
    info!("roomkeep started");
    info!("  data_dir: {}", config.data_dir.display());
    info!("  today: {}", engine.today());
    info!("  rooms: {}", report.statuses.len() + report.failures.len());
    info!("  reconcile every: {:?}", config.reconcile_interval);
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );
    for (room_id, e) in &report.failures {
        warn!(%room_id, "room needs attention: {e}");
    }

    let sweeper = tokio::spawn(sweeper::run_sweeper(
        engine.clone(),
        Some(store.clone()),
        config.reconcile_interval,
        config.compact_threshold,
    ));

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

    info!("shutdown signal received, stopping sweeper");
    sweeper.abort();
    let _ = sweeper.await;

    match store.compact().await {
        Ok(()) => info!("WAL compacted on exit"),
        Err(e) => warn!("WAL compaction on exit failed: {e}"),
    }
    info!("roomkeep stopped");
    Ok(())
}
