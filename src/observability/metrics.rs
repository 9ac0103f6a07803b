//! Metrics collection and exposition.
//!
//! # Metrics
//! - `bridge_requests_total` (counter): exchanges by status sent
//! - `bridge_request_duration_seconds` (histogram): time from inbound call
//!   to end of response
//! - `bridge_fallback_responses_total` (counter): fallback responses by reason
//! - `bridge_in_flight_requests` (gauge): exchanges currently holding a permit
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - The Prometheus exporter serves its own scrape listener

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and start its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one finished exchange. `status` is `None` when nothing was sent.
pub fn record_request(method: &str, status: Option<u16>, start_time: Instant) {
    let status = status.map_or_else(|| "none".to_string(), |s| s.to_string());
    counter!("bridge_requests_total", "method" => method.to_string(), "status" => status).increment(1);
    histogram!("bridge_request_duration_seconds").record(start_time.elapsed().as_secs_f64());
}

pub fn record_fallback(reason: &'static str) {
    counter!("bridge_fallback_responses_total", "reason" => reason).increment(1);
}

/// Tracks one in-flight exchange for as long as it lives.
#[derive(Debug)]
pub struct InFlightGuard(());

impl InFlightGuard {
    pub fn new() -> Self {
        gauge!("bridge_in_flight_requests").increment(1.0);
        Self(())
    }
}

impl Default for InFlightGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        gauge!("bridge_in_flight_requests").decrement(1.0);
    }
}
