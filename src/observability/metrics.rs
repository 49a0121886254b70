//! Metrics collection and exposition.
//!
//! # Metrics
//! - `imds_requests_total` (counter): requests by method, status, category
//! - `imds_request_duration_seconds` (histogram): latency distribution
//! - `imds_in_flight_requests` (gauge): requests being handled
//! - `imds_tokens_issued_total` (counter): session tokens issued
//! - `imds_tokens_rejected_total` (counter): rejected tokens by reason
//! - `imds_active_tokens` (gauge): tokens held by the store
//! - `imds_faults_injected_total` (counter): forced statuses by path
//!
//! # Design Decisions
//! - Low-overhead metric updates through the `metrics` facade
//! - Without an installed recorder every call is a no-op

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Start the Prometheus scrape listener. Must be called from within a Tokio
/// runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, category: &str, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
        ("category", category.to_string()),
    ];
    counter!("imds_requests_total", &labels[..]).increment(1);
    histogram!("imds_request_duration_seconds", &labels[..]).record(start.elapsed().as_secs_f64());
}

pub fn set_in_flight(count: usize) {
    gauge!("imds_in_flight_requests").set(count as f64);
}

pub fn record_token_issued(active: usize) {
    counter!("imds_tokens_issued_total").increment(1);
    gauge!("imds_active_tokens").set(active as f64);
}

pub fn record_active_tokens(active: usize) {
    gauge!("imds_active_tokens").set(active as f64);
}

pub fn record_token_rejected(reason: &'static str) {
    counter!("imds_tokens_rejected_total", "reason" => reason).increment(1);
}

pub fn record_fault_injected(path: &str, status: u16) {
    counter!(
        "imds_faults_injected_total",
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}
