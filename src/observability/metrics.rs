//! Metrics collection and exposition.
//!
//! # Metrics
//! - `balancer_sessions_total` (counter): sessions routed, by backend
//! - `balancer_dial_failures_total` (counter): failed dials, by backend
//! - `balancer_active_sessions` (gauge): sessions currently alive
//! - `balancer_relay_bytes_total` (counter): bytes relayed, by direction
//! - `balancer_accept_errors_total` (counter): transient accept failures
//!
//! Without an installed recorder every call is a no-op.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

use crate::proxy::relay::Direction;

/// Install the Prometheus exporter with an HTTP scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), metrics_exporter_prometheus::BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_session_started(backend: &str) {
    counter!("balancer_sessions_total", "backend" => backend.to_string()).increment(1);
    gauge!("balancer_active_sessions").increment(1.0);
}

pub fn record_session_finished() {
    gauge!("balancer_active_sessions").decrement(1.0);
}

pub fn record_dial_failure(backend: &str) {
    counter!("balancer_dial_failures_total", "backend" => backend.to_string()).increment(1);
}

pub fn record_relay_bytes(direction: Direction, bytes: u64) {
    counter!("balancer_relay_bytes_total", "direction" => direction.as_str()).increment(bytes);
}

pub fn record_accept_error() {
    counter!("balancer_accept_errors_total").increment(1);
}
