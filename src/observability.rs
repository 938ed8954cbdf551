use std::net::SocketAddr;

// ── Synchronizer ────────────────────────────────────────────────

/// Counter: synchronization passes. Labels: status (ok, error, skipped).
pub const SYNC_PASSES_TOTAL: &str = "roomsched_sync_passes_total";

/// Counter: bookings materialized from the reference timetable.
pub const SYNC_BOOKINGS_CREATED_TOTAL: &str = "roomsched_sync_bookings_created_total";

/// Histogram: duration of a real synchronization pass in seconds.
pub const SYNC_DURATION_SECONDS: &str = "roomsched_sync_duration_seconds";

// ── Lifecycle ───────────────────────────────────────────────────

/// Counter: lifecycle operations. Labels: op, status.
pub const BOOKING_MUTATIONS_TOTAL: &str = "roomsched_booking_mutations_total";

// ── Monitor ─────────────────────────────────────────────────────

/// Counter: ending-soon notifications handed to the notifier.
pub const NOTIFICATIONS_SENT_TOTAL: &str = "roomsched_notifications_sent_total";

/// Gauge: bookings that ended within the last 15 minutes.
pub const EXPIRING_BOOKINGS: &str = "roomsched_expiring_bookings";

/// Gauge: bookings ending within the next 5 minutes.
pub const PRE_EXPIRING_BOOKINGS: &str = "roomsched_pre_expiring_bookings";

// ── WAL ─────────────────────────────────────────────────────────

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "roomsched_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "roomsched_wal_flush_batch_size";

/// Counter: WAL compactions.
pub const WAL_COMPACTIONS_TOTAL: &str = "roomsched_wal_compactions_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}
