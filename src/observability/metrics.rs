//! Metrics collection and exposition.
//!
//! # Metrics
//! - `dispatch_requests_total` (counter): requests by method, status, route
//! - `dispatch_request_duration_seconds` (histogram): latency distribution
//! - `container_resolution_failures_total` (counter)
//! - `container_singletons_created_total` (counter)
//!
//! # Design Decisions
//! - Route label is the pattern, never the raw path, to bound cardinality
//! - Recording is a no-op until `init_metrics` installs the exporter

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one dispatched request.
pub fn record_dispatch(method: &str, status: u16, route: &str, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
        ("route", route.to_string()),
    ];
    counter!("dispatch_requests_total", &labels).increment(1);
    histogram!("dispatch_request_duration_seconds", &labels).record(start.elapsed().as_secs_f64());
}

pub fn record_resolution_failure() {
    counter!("container_resolution_failures_total").increment(1);
}

pub fn record_singleton_created() {
    counter!("container_singletons_created_total").increment(1);
}
