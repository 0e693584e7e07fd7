//! Metrics collection and exposition.
//!
//! # Metrics
//! - `http_requests_total` (counter): requests by method, status
//! - `http_request_duration_seconds` (histogram): latency by method
//! - `http_requests_in_flight` (gauge): requests currently inside the chain
//! - `response_cache_total` (counter): cache outcomes by result
//! - `response_cache_entries` (gauge): stored responses
//! - `handler_panics_total` (counter): panics caught by the recovery stage
//! - `session_decode_failures_total` (counter): rejected session cookies by kind
//!
//! # Design Decisions
//! - The recorder is process-wide and installed once; without it every
//!   macro call is a no-op, so tests need no setup

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub mod names {
    pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "http_requests_in_flight";
    pub const RESPONSE_CACHE_TOTAL: &str = "response_cache_total";
    pub const RESPONSE_CACHE_ENTRIES: &str = "response_cache_entries";
    pub const HANDLER_PANICS_TOTAL: &str = "handler_panics_total";
    pub const SESSION_DECODE_FAILURES_TOTAL: &str = "session_decode_failures_total";
}

/// Install the Prometheus recorder.
///
/// Returns `true` if this call installed it.
pub fn init_metrics() -> bool {
    if PROMETHEUS_HANDLE.get().is_some() {
        tracing::debug!("Prometheus metrics already initialized");
        return false;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if PROMETHEUS_HANDLE.set(handle).is_err() {
                tracing::warn!("Failed to store Prometheus handle (already set)");
                return false;
            }
            tracing::info!("Prometheus metrics initialized");
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to install Prometheus recorder");
            false
        }
    }
}

/// Whether a recorder is installed.
pub fn is_initialized() -> bool {
    PROMETHEUS_HANDLE.get().is_some()
}

/// Render all metrics in Prometheus text format.
///
/// Returns `None` if metrics were not initialized.
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|handle| handle.render())
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        names::HTTP_REQUESTS_TOTAL,
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        names::HTTP_REQUEST_DURATION_SECONDS,
        "method" => method.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

/// Counts a request as in flight until dropped.
pub struct InFlightGuard(());

impl InFlightGuard {
    pub fn enter() -> Self {
        gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);
        Self(())
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);
    }
}

/// Cache outcome: `hit`, `miss`, `refresh`, `store` or `coalesced`.
pub fn record_cache(result: &'static str) {
    counter!(names::RESPONSE_CACHE_TOTAL, "result" => result).increment(1);
}

pub fn set_cache_entries(len: usize) {
    gauge!(names::RESPONSE_CACHE_ENTRIES).set(len as f64);
}

pub fn record_panic() {
    counter!(names::HANDLER_PANICS_TOTAL).increment(1);
}

pub fn record_session_failure(kind: &'static str) {
    counter!(names::SESSION_DECODE_FAILURES_TOTAL, "kind" => kind).increment(1);
}
