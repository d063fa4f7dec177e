//! Metrics collection and export for Ephemera.
//!
//! Uses the `metrics` crate for instrumentation and exports
//! to Prometheus format.

use anyhow::{Context, Result};
use ephemera_transport::{CloseCause, SessionSummary};
use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;

/// Metric names.
pub mod names {
    pub const CONNECTIONS_TOTAL: &str = "ephemera_connections_total";
    pub const CONNECTIONS_ACTIVE: &str = "ephemera_connections_active";
    pub const MESSAGES_TOTAL: &str = "ephemera_messages_total";
    pub const MESSAGES_BYTES: &str = "ephemera_messages_bytes";
    pub const ROOMS_ACTIVE: &str = "ephemera_rooms_active";
    pub const DELIVERIES_DROPPED: &str = "ephemera_deliveries_dropped_total";
    pub const ERRORS_TOTAL: &str = "ephemera_errors_total";
}

/// Initialize the metrics system.
pub fn init_metrics() {
    metrics::describe_counter!(
        names::CONNECTIONS_TOTAL,
        "Total number of connections since server start"
    );
    metrics::describe_gauge!(
        names::CONNECTIONS_ACTIVE,
        "Current number of active connections"
    );
    metrics::describe_counter!(names::MESSAGES_TOTAL, "Total number of messages relayed");
    metrics::describe_counter!(names::MESSAGES_BYTES, "Total bytes of messages relayed");
    metrics::describe_gauge!(names::ROOMS_ACTIVE, "Current number of rooms with subscribers");
    metrics::describe_counter!(
        names::DELIVERIES_DROPPED,
        "Subscribers removed because delivery failed"
    );
    metrics::describe_counter!(names::ERRORS_TOTAL, "Total number of errors");

    info!("Metrics initialized");
}

/// Start the Prometheus metrics server.
///
/// # Errors
///
/// Returns an error if the exporter cannot be installed.
pub fn start_metrics_server(port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Failed to install Prometheus exporter")?;

    info!("Metrics server listening on {}", addr);
    Ok(())
}

/// Record a new connection.
pub fn record_connection() {
    counter!(names::CONNECTIONS_TOTAL).increment(1);
    gauge!(names::CONNECTIONS_ACTIVE).increment(1.0);
}

/// Record a disconnection.
pub fn record_disconnection() {
    gauge!(names::CONNECTIONS_ACTIVE).decrement(1.0);
}

/// Record relayed messages.
pub fn record_messages(count: u64, bytes: u64, direction: &'static str) {
    counter!(names::MESSAGES_TOTAL, "direction" => direction).increment(count);
    counter!(names::MESSAGES_BYTES, "direction" => direction).increment(bytes);
}

/// Record subscribers dropped by a publish.
pub fn record_dropped(count: usize) {
    if count > 0 {
        counter!(names::DELIVERIES_DROPPED).increment(count as u64);
    }
}

/// Update active room count.
pub fn set_active_rooms(count: usize) {
    gauge!(names::ROOMS_ACTIVE).set(count as f64);
}

/// Record an error.
pub fn record_error(error_type: &'static str) {
    counter!(names::ERRORS_TOTAL, "type" => error_type).increment(1);
}

/// Record the counters of a finished session.
pub fn record_session(summary: &SessionSummary) {
    record_messages(summary.inbound_messages, summary.inbound_bytes, "inbound");
    record_messages(summary.outbound_messages, summary.outbound_bytes, "outbound");
    record_dropped(summary.dropped_deliveries as usize);

    if summary.malformed > 0 {
        counter!(names::ERRORS_TOTAL, "type" => "malformed_payload").increment(summary.malformed);
    }
    match summary.cause {
        CloseCause::Transport => record_error("transport"),
        CloseCause::Signalled(ephemera_core::CloseReason::Overflow) => record_error("overflow"),
        CloseCause::ClientClosed | CloseCause::Signalled(_) => {}
    }
}

/// Metrics guard that records disconnection on drop.
pub struct ConnectionMetricsGuard;

impl ConnectionMetricsGuard {
    /// Create a new metrics guard, recording a connection.
    #[must_use]
    pub fn new() -> Self {
        record_connection();
        Self
    }
}

impl Default for ConnectionMetricsGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ConnectionMetricsGuard {
    fn drop(&mut self) {
        record_disconnection();
    }
}
