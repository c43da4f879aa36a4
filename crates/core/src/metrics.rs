//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Submissions (ingestions and items accepted)
//! - Dispatch (batches, items, retries, rate-gate waits)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Submission Metrics
// =============================================================================

/// Ingestions accepted total by priority.
pub static SUBMISSIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("ingestor_submissions_total", "Total ingestions accepted"),
        &["priority"], // "high", "medium", "low"
    )
    .unwrap()
});

/// Items accepted total.
pub static ITEMS_SUBMITTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("ingestor_items_submitted_total", "Total items accepted").unwrap()
});

/// Submissions rejected by validation.
pub static SUBMISSIONS_REJECTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "ingestor_submissions_rejected_total",
        "Total submissions rejected by validation",
    )
    .unwrap()
});

// =============================================================================
// Dispatch Metrics
// =============================================================================

/// Batches dispatched total by result.
pub static BATCHES_DISPATCHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("ingestor_batches_dispatched_total", "Total batches dispatched"),
        &["result"], // "completed", "failed"
    )
    .unwrap()
});

/// Batch duration in seconds, from trigger to terminal status.
pub static BATCH_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "ingestor_batch_duration_seconds",
            "Duration of batch processing",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]),
        &["result"],
    )
    .unwrap()
});

/// Items processed total by result.
pub static ITEMS_PROCESSED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("ingestor_items_processed_total", "Total items processed"),
        &["result"], // "success", "failed", "timeout"
    )
    .unwrap()
});

/// Item retry attempts total.
pub static ITEM_RETRIES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("ingestor_item_retries_total", "Total item retry attempts").unwrap()
});

/// Time spent waiting on the rate gate before a dispatch.
pub static RATE_GATE_WAIT: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "ingestor_rate_gate_wait_seconds",
            "Time a popped batch waited for its dispatch turn",
        )
        .buckets(vec![0.0, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
        &[],
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Submissions
        Box::new(SUBMISSIONS_TOTAL.clone()),
        Box::new(ITEMS_SUBMITTED.clone()),
        Box::new(SUBMISSIONS_REJECTED.clone()),
        // Dispatch
        Box::new(BATCHES_DISPATCHED.clone()),
        Box::new(BATCH_DURATION.clone()),
        Box::new(ITEMS_PROCESSED.clone()),
        Box::new(ITEM_RETRIES.clone()),
        Box::new(RATE_GATE_WAIT.clone()),
    ]
}
