//! Prometheus metrics for monitoring the chat proxy server.

use prometheus::{
    register_gauge_vec, register_histogram_vec, register_int_counter, register_int_counter_vec,
    GaugeVec, HistogramVec, IntCounter, IntCounterVec,
};
use std::sync::OnceLock;

/// Container for all application metrics.
pub struct Metrics {
    /// Total number of requests by method, endpoint, and status
    pub request_count: IntCounterVec,

    /// Time until response headers are returned, in seconds
    pub request_duration: HistogramVec,

    /// Number of currently active requests by endpoint
    pub active_requests: GaugeVec,

    /// Upstream calls by provider and outcome status code
    pub upstream_requests: IntCounterVec,

    /// Failed completions by provider and error kind
    pub completion_errors: IntCounterVec,

    /// Text deltas forwarded to callers, by provider
    pub streamed_chunks: IntCounterVec,

    /// Bytes of text forwarded to callers, by provider
    pub streamed_bytes: IntCounterVec,

    /// Time to first forwarded delta, in seconds
    pub ttft: HistogramVec,

    /// Streams abandoned by the caller before completion
    pub client_disconnects_total: IntCounter,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Initialize the metrics registry.
///
/// Safe to call repeatedly; every call returns the same instance.
pub fn init_metrics() -> &'static Metrics {
    METRICS.get_or_init(|| {
        let request_count = register_int_counter_vec!(
            "chat_proxy_requests_total",
            "Total number of requests",
            &["method", "endpoint", "status_code"]
        )
        .expect("Failed to register request_count metric");

        let request_duration = register_histogram_vec!(
            "chat_proxy_request_duration_seconds",
            "Time until response headers are sent, in seconds",
            &["method", "endpoint"],
            vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]
        )
        .expect("Failed to register request_duration metric");

        let active_requests = register_gauge_vec!(
            "chat_proxy_active_requests",
            "Number of active requests",
            &["endpoint"]
        )
        .expect("Failed to register active_requests metric");

        let upstream_requests = register_int_counter_vec!(
            "chat_proxy_upstream_requests_total",
            "Upstream chat completion calls by response status",
            &["provider", "status_code"]
        )
        .expect("Failed to register upstream_requests metric");

        let completion_errors = register_int_counter_vec!(
            "chat_proxy_completion_errors_total",
            "Failed chat completions by error kind",
            &["provider", "kind"]
        )
        .expect("Failed to register completion_errors metric");

        let streamed_chunks = register_int_counter_vec!(
            "chat_proxy_streamed_chunks_total",
            "Text deltas forwarded to callers",
            &["provider"]
        )
        .expect("Failed to register streamed_chunks metric");

        let streamed_bytes = register_int_counter_vec!(
            "chat_proxy_streamed_bytes_total",
            "Bytes of completion text forwarded to callers",
            &["provider"]
        )
        .expect("Failed to register streamed_bytes metric");

        let ttft = register_histogram_vec!(
            "chat_proxy_ttft_seconds",
            "Time to first forwarded delta in seconds",
            &["provider"],
            vec![0.05, 0.1, 0.2, 0.5, 1.0, 2.0, 5.0, 10.0]
        )
        .expect("Failed to register ttft metric");

        let client_disconnects_total = register_int_counter!(
            "chat_proxy_client_disconnects_total",
            "Completion streams abandoned by the caller"
        )
        .expect("Failed to register client_disconnects metric");

        Metrics {
            request_count,
            request_duration,
            active_requests,
            upstream_requests,
            completion_errors,
            streamed_chunks,
            streamed_bytes,
            ttft,
            client_disconnects_total,
        }
    })
}

/// Get the global metrics instance, initializing it on first use.
pub fn get_metrics() -> &'static Metrics {
    init_metrics()
}
