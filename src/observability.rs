use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: reservations created.
pub const RESERVATIONS_CREATED_TOTAL: &str = "reservo_reservations_created_total";

/// Counter: rejected reservation requests. Labels: code, stage.
pub const RESERVATIONS_REJECTED_TOTAL: &str = "reservo_reservations_rejected_total";

/// Histogram: engine latency per reservation request in seconds.
pub const REQUEST_DURATION_SECONDS: &str = "reservo_request_duration_seconds";

/// Counter: protocol frames handled. Labels: op, code.
pub const FRAMES_TOTAL: &str = "reservo_frames_total";

// ── Degraded-path metrics ───────────────────────────────────────

/// Counter: best-effort follow-up writes that failed. Labels: effect.
pub const FOLLOWUP_FAILURES_TOTAL: &str = "reservo_followup_failures_total";

/// Counter: candidate listings that failed and were treated as empty.
pub const CANDIDATE_LIST_FAILURES_TOTAL: &str = "reservo_candidate_list_failures_total";

/// Counter: caller totals that disagree with base + fees + tax.
pub const TOTAL_OVERRIDE_MISMATCH_TOTAL: &str = "reservo_total_override_mismatch_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "reservo_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "reservo_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "reservo_connections_rejected_total";

/// Counter: failed session handshakes.
pub const AUTH_FAILURES_TOTAL: &str = "reservo_auth_failures_total";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "reservo_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "reservo_wal_flush_batch_size";

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
