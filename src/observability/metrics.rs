//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status, dialect
//! - `gateway_request_duration_seconds` (histogram): latency by method, dialect
//! - `gateway_backend_failures_total` (counter): failed backend calls by kind
//!
//! # Design Decisions
//! - Recording is always on; without an installed recorder it is a no-op
//! - Prometheus exposition only when `metrics_enabled` is set

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

pub const REQUESTS_TOTAL: &str = "gateway_requests_total";
pub const REQUEST_DURATION_SECONDS: &str = "gateway_request_duration_seconds";
pub const BACKEND_FAILURES_TOTAL: &str = "gateway_backend_failures_total";

/// Start the Prometheus scrape endpoint on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one completed inbound request.
pub fn record_request(method: &str, status: u16, dialect: &str, start: Instant) {
    metrics::counter!(
        REQUESTS_TOTAL,
        "method" => method.to_string(),
        "status" => status.to_string(),
        "dialect" => dialect.to_string()
    )
    .increment(1);
    metrics::histogram!(
        REQUEST_DURATION_SECONDS,
        "method" => method.to_string(),
        "dialect" => dialect.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record a backend call that produced no usable response.
pub fn record_backend_failure(kind: &'static str) {
    metrics::counter!(BACKEND_FAILURES_TOTAL, "kind" => kind).increment(1);
}
