//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the ingestor server:
//! - HTTP request metrics (latency, counts, in flight)
//! - Scheduler state (collected dynamically on scrape)
//! - Core submission and dispatch metrics (registered from ingestor-core)

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// Path label for requests that matched no route.
pub const UNMATCHED_PATH: &str = "unmatched";

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "ingestor_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("ingestor_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "ingestor_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Scheduler Metrics (collected dynamically)
// =============================================================================

/// Dispatcher running state (1 = running, 0 = stopped).
pub static DISPATCHER_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "ingestor_dispatcher_running",
        "Whether the dispatcher is running (1) or stopped (0)",
    )
    .unwrap()
});

/// Batches waiting in the priority queue.
pub static QUEUE_DEPTH: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("ingestor_queue_depth", "Number of batches waiting for dispatch").unwrap()
});

/// Items currently holding a processing slot.
pub static ITEMS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "ingestor_items_in_flight",
        "Number of items currently being processed",
    )
    .unwrap()
});

/// Batches by current status.
pub static BATCHES_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("ingestor_batches_by_status", "Current batch count by status"),
        &["status"],
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Scheduler
    registry
        .register(Box::new(DISPATCHER_RUNNING.clone()))
        .unwrap();
    registry.register(Box::new(QUEUE_DEPTH.clone())).unwrap();
    registry
        .register(Box::new(ITEMS_IN_FLIGHT.clone()))
        .unwrap();
    registry
        .register(Box::new(BATCHES_BY_STATUS.clone()))
        .unwrap();

    // Core metrics (submissions, dispatch)
    for metric in ingestor_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Collect dynamic metrics from current application state.
///
/// This is called before encoding metrics to update gauges with current values
/// from the dispatcher and the ingestion registry.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let status = state.dispatcher().status();

    DISPATCHER_RUNNING.set(if status.running { 1 } else { 0 });
    QUEUE_DEPTH.set(status.queued_batches as i64);
    ITEMS_IN_FLIGHT.set(status.item_pool.active as i64);

    let batches = status.batches;
    for (label, count) in [
        ("yet_to_start", batches.not_started),
        ("triggered", batches.triggered),
        ("completed", batches.completed),
        ("failed", batches.failed),
    ] {
        BATCHES_BY_STATUS
            .with_label_values(&[label])
            .set(count as i64);
    }
}
