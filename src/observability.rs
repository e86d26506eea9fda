use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::agent::Termination;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: tool calls dispatched. Labels: tool, status.
pub const TOOL_CALLS_TOTAL: &str = "slotbook_tool_calls_total";

/// Counter: model collaborator calls. Labels: status.
pub const MODEL_CALLS_TOTAL: &str = "slotbook_model_calls_total";

/// Histogram: model call latency in seconds.
pub const MODEL_CALL_DURATION_SECONDS: &str = "slotbook_model_call_duration_seconds";

/// Counter: finished sessions. Labels: outcome.
pub const SESSIONS_TOTAL: &str = "slotbook_sessions_total";

// ── Ledger ──────────────────────────────────────────────────────

/// Counter: bookings committed.
pub const BOOKINGS_TOTAL: &str = "slotbook_bookings_total";

/// Counter: appends rejected because the slot overlapped an existing booking.
pub const BOOKING_CONFLICTS_TOTAL: &str = "slotbook_booking_conflicts_total";

/// Histogram: ledger group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "slotbook_wal_flush_duration_seconds";

/// Histogram: ledger group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "slotbook_wal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Map a session outcome to a short label for metrics.
pub fn outcome_label(termination: &Termination) -> &'static str {
    match termination {
        Termination::Terminated { .. } => "terminated",
        Termination::Exhausted => "exhausted",
        Termination::Interrupted { .. } => "interrupted",
    }
}
