//! Types for the batch dispatcher.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Instant;

use crate::ingestion::{BatchCounts, BatchStatus, IngestionError};

use super::limiter::PoolStatus;

/// Errors that can occur during dispatch.
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Ingestion store error.
    #[error("ingestion store error: {0}")]
    Ingestion(#[from] IngestionError),

    /// The concurrency limiter was closed.
    #[error("concurrency limiter closed")]
    LimiterClosed,
}

/// Result of one dispatch cycle.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub ingestion_id: String,
    pub batch_id: String,
    /// Final status of the batch: `Completed` or `Failed`.
    pub status: BatchStatus,
    pub items_processed: usize,
    pub items_failed: usize,
    /// When the rate gate granted this dispatch; the batch became
    /// `Triggered` right after.
    pub triggered_at: Instant,
    pub finished_at: Instant,
}

/// Current status of the dispatcher.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatcherStatus {
    /// Whether the dispatch loop is running.
    pub running: bool,
    /// Batches waiting in the priority queue.
    pub queued_batches: usize,
    /// Milliseconds until the rate gate grants the next dispatch.
    pub next_dispatch_in_ms: u64,
    /// Item slot usage.
    pub item_pool: PoolStatus,
    /// Batches popped by the dispatcher since startup.
    pub batches_dispatched: u64,
    pub batches_completed: u64,
    pub batches_failed: u64,
    /// Registry-wide batch totals per status.
    pub batches: BatchCounts,
}
