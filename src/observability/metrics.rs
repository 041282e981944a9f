//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Own the process-wide connection and request counters
//! - Enforce the admission ceiling atomically
//! - Produce the snapshot served on `/metrics`
//! - Mirror every update into the `metrics` facade for Prometheus
//!
//! # Metrics
//! - `tcp_proxy_active_connections` (gauge): current connection count
//! - `tcp_proxy_requests_total` (counter): completed requests
//! - `tcp_proxy_request_duration_seconds` (histogram): handler latency
//! - `tcp_proxy_rejected_connections_total` (counter): admission rejections
//! - `tcp_proxy_upstream_errors_total` (counter): failed forwards

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const ACTIVE_CONNECTIONS: &str = "tcp_proxy_active_connections";
pub const REQUESTS_TOTAL: &str = "tcp_proxy_requests_total";
pub const REQUEST_DURATION: &str = "tcp_proxy_request_duration_seconds";
pub const REJECTED_TOTAL: &str = "tcp_proxy_rejected_connections_total";
pub const UPSTREAM_ERRORS_TOTAL: &str = "tcp_proxy_upstream_errors_total";

/// Install the global Prometheus recorder.
///
/// Only the first call in a process succeeds.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    metrics::describe_gauge!(ACTIVE_CONNECTIONS, "Currently open TCP connections");
    metrics::describe_counter!(REQUESTS_TOTAL, "Requests that reached the forward step");
    metrics::describe_histogram!(REQUEST_DURATION, "Time from accept to response written");
    metrics::describe_counter!(REJECTED_TOTAL, "Connections closed by the admission policy");
    metrics::describe_counter!(UPSTREAM_ERRORS_TOTAL, "Forwarding failures");

    tracing::info!("Prometheus recorder installed");
    Ok(handle)
}

/// Point-in-time view of the counters, as served to autoscalers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub active_connections: u64,
    pub total_requests: u64,
    /// Duration of the most recently completed request. Not an average; the
    /// wire name is kept for existing scaler configurations.
    #[serde(rename = "avg_duration_ms")]
    pub last_duration_ms: u64,
}

/// Shared counters touched by every connection handler.
#[derive(Debug, Default)]
pub struct Counters {
    active_connections: AtomicU64,
    total_requests: AtomicU64,
    last_duration_ms: AtomicU64,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a connection slot if fewer than `max` are active.
    ///
    /// The check and the increment are a single atomic step, so concurrent
    /// callers can never push the count above `max`.
    pub fn try_acquire(self: &Arc<Self>, max: usize) -> Option<ActiveConnection> {
        let max = max as u64;
        let acquired = self
            .active_connections
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| (n < max).then_some(n + 1));

        match acquired {
            Ok(previous) => {
                metrics::gauge!(ACTIVE_CONNECTIONS).set((previous + 1) as f64);
                Some(ActiveConnection {
                    counters: Arc::clone(self),
                })
            }
            Err(_) => None,
        }
    }

    /// Record a handler that reached its completion point.
    pub fn record_completion(&self, elapsed: Duration) {
        let millis = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self.last_duration_ms.store(millis, Ordering::Relaxed);
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        metrics::counter!(REQUESTS_TOTAL).increment(1);
        metrics::histogram!(REQUEST_DURATION).record(elapsed.as_secs_f64());
    }

    pub fn record_rejection(&self) {
        metrics::counter!(REJECTED_TOTAL).increment(1);
    }

    pub fn record_upstream_failure(&self) {
        metrics::counter!(UPSTREAM_ERRORS_TOTAL).increment(1);
    }

    pub fn active_connections(&self) -> u64 {
        self.active_connections.load(Ordering::SeqCst)
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    pub fn last_duration_ms(&self) -> u64 {
        self.last_duration_ms.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            active_connections: self.active_connections(),
            total_requests: self.total_requests(),
            last_duration_ms: self.last_duration_ms(),
        }
    }
}

/// A claimed connection slot. Releases the slot when dropped.
#[derive(Debug)]
pub struct ActiveConnection {
    counters: Arc<Counters>,
}

impl Drop for ActiveConnection {
    fn drop(&mut self) {
        let previous = self.counters.active_connections.fetch_sub(1, Ordering::SeqCst);
        metrics::gauge!(ACTIVE_CONNECTIONS).set(previous.saturating_sub(1) as f64);
    }
}
