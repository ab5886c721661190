//! Prometheus metrics for gather-server.
//!
//! Exposes server metrics in Prometheus format at the `/metrics` endpoint.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

/// Initialize the Prometheus metrics recorder and return a handle for rendering.
///
/// Must be called once at server startup before any metrics are recorded.
pub fn init_metrics() -> PrometheusHandle {
    let builder = PrometheusBuilder::new();
    let handle = builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    describe_counter!(
        "gather_requests_total",
        "Total number of API requests processed"
    );
    describe_histogram!(
        "gather_request_duration_seconds",
        "Duration of successful API requests in seconds"
    );
    describe_counter!(
        "gather_errors_total",
        "Total number of failed API requests by error code"
    );

    handle
}

fn record_request(operation: &'static str, duration: std::time::Duration) {
    counter!("gather_requests_total", "operation" => operation, "status" => "ok").increment(1);
    histogram!("gather_request_duration_seconds", "operation" => operation)
        .record(duration.as_secs_f64());
}

fn record_error(operation: &'static str, code: &'static str) {
    counter!("gather_requests_total", "operation" => operation, "status" => "error")
        .increment(1);
    counter!("gather_errors_total", "operation" => operation, "code" => code).increment(1);
}

/// Times one API operation and records the outcome when finished.
pub struct RequestTimer {
    operation: &'static str,
    start: Instant,
}

impl RequestTimer {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            start: Instant::now(),
        }
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn success(self) {
        record_request(self.operation, self.start.elapsed());
    }

    /// Record a failure with the given error code (e.g. `unauthorized`).
    pub fn error(self, code: &'static str) {
        record_error(self.operation, code);
    }
}
