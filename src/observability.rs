use std::net::SocketAddr;

// ── Booking flow ────────────────────────────────────────────────

/// Counter: bookings created.
pub const BOOKINGS_CREATED_TOTAL: &str = "roomkeep_bookings_created_total";

/// Counter: create requests rejected. Labels: reason (validation, conflict, not_found, store).
pub const BOOKINGS_REJECTED_TOTAL: &str = "roomkeep_bookings_rejected_total";

/// Counter: lifecycle transitions. Labels: action, status (ok, error).
pub const TRANSITIONS_TOTAL: &str = "roomkeep_transitions_total";

// ── Reconciliation ──────────────────────────────────────────────

/// Histogram: duration of a full reconciliation pass in seconds.
pub const RECONCILE_DURATION_SECONDS: &str = "roomkeep_reconcile_duration_seconds";

/// Counter: rooms that failed to reconcile.
pub const RECONCILE_FAILURES_TOTAL: &str = "roomkeep_reconcile_failures_total";

/// Counter: room status changes. Labels: to.
pub const ROOM_STATUS_CHANGES_TOTAL: &str = "roomkeep_room_status_changes_total";

/// Gauge: active rooms per status after the last stats pass. Labels: status.
pub const ROOMS_BY_STATUS: &str = "roomkeep_rooms_by_status";

/// Gauge: occupancy rate in percent after the last stats pass.
pub const OCCUPANCY_RATE: &str = "roomkeep_occupancy_rate";

// ── Storage ─────────────────────────────────────────────────────

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "roomkeep_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (records per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "roomkeep_wal_flush_batch_size";

/// Counter: WAL compactions.
pub const WAL_COMPACTIONS_TOTAL: &str = "roomkeep_wal_compactions_total";

/// Install the Prometheus exporter on `port`. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}
