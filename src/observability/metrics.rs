//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status
//! - `gateway_request_duration_seconds` (histogram): latency distribution
//! - `gateway_throttled_total` (counter): abuse guard rejections by reason
//! - `gateway_sessions_total` (counter): decoded session cookies by format
//! - `gateway_panics_total` (counter): recovered handler panics

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on `addr`. Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    metrics::counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("gateway_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_throttled(reason: &'static str) {
    metrics::counter!("gateway_throttled_total", "reason" => reason).increment(1);
}

pub fn record_session(format: &'static str) {
    metrics::counter!("gateway_sessions_total", "format" => format).increment(1);
}

pub fn record_panic() {
    metrics::counter!("gateway_panics_total").increment(1);
}
