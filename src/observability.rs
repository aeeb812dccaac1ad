use std::net::SocketAddr;

use metrics_exporter_prometheus::BuildError;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total requests handled. Labels: op, outcome.
pub const REQUESTS_TOTAL: &str = "tripledger_requests_total";

/// Histogram: request latency in seconds. Labels: op.
pub const REQUEST_DURATION_SECONDS: &str = "tripledger_request_duration_seconds";

// ── Booking lifecycle ───────────────────────────────────────────

/// Counter: trips committed.
pub const TRIPS_BOOKED_TOTAL: &str = "tripledger_trips_booked_total";

/// Counter: bookings or edits refused because of an overlapping trip.
pub const BOOKING_CONFLICTS_TOTAL: &str = "tripledger_booking_conflicts_total";

/// Counter: trips rescheduled.
pub const TRIPS_EDITED_TOTAL: &str = "tripledger_trips_edited_total";

/// Counter: trips cancelled. Labels: status.
pub const TRIPS_CANCELLED_TOTAL: &str = "tripledger_trips_cancelled_total";

/// Counter: trips marked completed by the sweeper.
pub const TRIPS_COMPLETED_TOTAL: &str = "tripledger_trips_completed_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: cars loaded in the store.
pub const CARS_LOADED: &str = "tripledger_cars_loaded";

/// Histogram: journal group-commit flush duration in seconds.
pub const JOURNAL_FLUSH_DURATION_SECONDS: &str = "tripledger_journal_flush_duration_seconds";

/// Histogram: journal group-commit batch size (records per flush).
pub const JOURNAL_FLUSH_BATCH_SIZE: &str = "tripledger_journal_flush_batch_size";

/// Counter: journal compactions completed.
pub const JOURNAL_COMPACTIONS_TOTAL: &str = "tripledger_journal_compactions_total";

/// Install the Prometheus exporter on `port`. No-op if `port` is None.
pub fn init(port: Option<u16>) -> Result<(), BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}
