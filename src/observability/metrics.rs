//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by method, status, decision
//! - `proxy_request_duration_seconds` (histogram): latency distribution
//! - `proxy_rejections_total` (counter): routing rejections by reason
//! - `proxy_transports_created_total` (counter): dynamic-port transports built
//! - `proxy_upgrades_total` (counter): WebSocket upgrades by outcome
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op (tests, `--check`)
//! - The Prometheus exporter serves its own HTTP listener

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, decision: &'static str, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
        ("decision", decision.to_string()),
    ];
    metrics::counter!("proxy_requests_total", &labels).increment(1);
    metrics::histogram!("proxy_request_duration_seconds", &labels)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_rejection(reason: &'static str) {
    metrics::counter!("proxy_rejections_total", "reason" => reason).increment(1);
}

pub fn record_transport_created() {
    metrics::counter!("proxy_transports_created_total").increment(1);
}

pub fn record_upgrade(outcome: &'static str) {
    metrics::counter!("proxy_upgrades_total", "outcome" => outcome).increment(1);
}
