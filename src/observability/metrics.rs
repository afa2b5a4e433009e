//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by endpoint, method, outcome
//! - `gateway_request_duration_seconds` (histogram): endpoint latency
//! - `gateway_backend_calls_total` (counter): backend calls by backend, status
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - Labels use the configured pattern, never the concrete path

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(endpoint: &str, method: &str, outcome: &str, started: Instant) {
    counter!(
        "gateway_requests_total",
        "endpoint" => endpoint.to_string(),
        "method" => method.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
    histogram!("gateway_request_duration_seconds", "endpoint" => endpoint.to_string())
        .record(started.elapsed().as_secs_f64());
}

pub fn record_backend_call(backend: &str, status: &str) {
    counter!(
        "gateway_backend_calls_total",
        "backend" => backend.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}
