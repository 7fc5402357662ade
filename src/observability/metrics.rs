//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by endpoint, status
//! - `gateway_request_duration_seconds` (histogram): latency by endpoint
//! - `gateway_backend_attempts_total` (counter): attempts by backend, outcome
//! - `gateway_breaker_state` (gauge): 0=closed, 1=half_open, 2=open
//! - `gateway_retrieval_results` (histogram): candidates returned by mode
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so library code
//!   and tests record unconditionally
//! - Labels stay low-cardinality: endpoint, backend name, outcome

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

use crate::resilience::BreakerState;
use crate::retrieval::SearchMode;

/// Install the Prometheus recorder and its HTTP scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(endpoint: &'static str, status: u16, start: Instant) {
    metrics::counter!(
        "gateway_requests_total",
        "endpoint" => endpoint,
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("gateway_request_duration_seconds", "endpoint" => endpoint)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_attempt(backend: &str, outcome: &'static str) {
    metrics::counter!(
        "gateway_backend_attempts_total",
        "backend" => backend.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_breaker_state(backend: &str, state: BreakerState) {
    metrics::gauge!("gateway_breaker_state", "backend" => backend.to_string())
        .set(state.as_gauge());
}

pub fn record_retrieval(mode: SearchMode, results: usize) {
    let mode = match mode {
        SearchMode::Vector => "vector",
        SearchMode::Text => "text",
        SearchMode::Hybrid => "hybrid",
    };
    metrics::histogram!("gateway_retrieval_results", "mode" => mode).record(results as f64);
}
