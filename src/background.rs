use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::engine::{now_ms, Engine};
use crate::sync::Synchronizer;

/// Stand-in for read traffic: pokes the gated synchronizer on a fixed cadence
/// so the horizon keeps rolling even when nobody lists rooms or bookings.
pub async fn run_sync_refresher(sync: Arc<Synchronizer>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    // The first tick fires immediately; startup already ran a forced pass.
    interval.tick().await;
    loop {
        interval.tick().await;
        sync.ensure_synced(now_ms()).await;
    }
}

/// Background task that compacts the WAL once it has grown past `threshold` appends.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(60));
    loop {
        interval.tick().await;
        let appends = engine.wal_appends_since_compact().await;
        if appends < threshold {
            continue;
        }
        match engine.compact_wal().await {
            Ok(()) => {
                metrics::counter!(crate::observability::WAL_COMPACTIONS_TOTAL).increment(1);
                info!("compacted WAL after {appends} appends");
            }
            Err(e) => warn!("WAL compaction failed: {e}"),
        }
    }
}
