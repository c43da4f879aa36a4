//! Priority queue of batches waiting for dispatch.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

use crate::ingestion::Priority;

/// A batch waiting in the queue.
///
/// The entry refers to its batch by id; batch state lives in the ingestion
/// store.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub ingestion_id: String,
    pub batch_id: String,
    /// Position of the batch within its ingestion.
    pub batch_index: usize,
    pub priority: Priority,
    pub enqueued_at: Instant,
    /// Push order, assigned by the queue.
    sequence: u64,
}

impl QueueEntry {
    pub fn new(
        ingestion_id: impl Into<String>,
        batch_id: impl Into<String>,
        batch_index: usize,
        priority: Priority,
    ) -> Self {
        Self {
            ingestion_id: ingestion_id.into(),
            batch_id: batch_id.into(),
            batch_index,
            priority,
            enqueued_at: Instant::now(),
            sequence: 0,
        }
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueEntry {}

impl Ord for QueueEntry {
    // The heap pops the greatest entry: lowest rank first, then the oldest.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .rank()
            .cmp(&self.priority.rank())
            .then_with(|| other.enqueued_at.cmp(&self.enqueued_at))
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Shared priority queue of pending batches.
///
/// Safe for concurrent pushes from request handlers and pops from the
/// dispatcher. The internal lock is only held for a single push or pop.
#[derive(Debug, Default)]
pub struct BatchQueue {
    heap: Mutex<BinaryHeap<QueueEntry>>,
    next_sequence: AtomicU64,
    notify: Notify,
}

impl BatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry and wake a waiting dispatcher.
    pub fn push(&self, mut entry: QueueEntry) {
        {
            let mut heap = self.heap.lock().unwrap_or_else(|e| e.into_inner());
            entry.sequence = self.next_sequence.fetch_add(1, AtomicOrdering::Relaxed);
            heap.push(entry);
        }
        self.notify.notify_one();
    }

    /// Remove and return the next entry to dispatch, if any.
    pub fn pop_next(&self) -> Option<QueueEntry> {
        let mut heap = self.heap.lock().unwrap_or_else(|e| e.into_inner());
        heap.pop()
    }

    pub fn len(&self) -> usize {
        self.heap.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait until the queue is non-empty or `timeout` elapses.
    ///
    /// Returns `true` if entries are available.
    pub async fn wait_for_entry(&self, timeout: Duration) -> bool {
        if !self.is_empty() {
            return true;
        }
        let _ = tokio::time::timeout(timeout, self.notify.notified()).await;
        !self.is_empty()
    }
}
