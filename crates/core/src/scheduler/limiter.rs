//! Bounded pool of item-processing slots shared by all batches.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::types::DispatcherError;

/// Snapshot of the limiter's slot usage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStatus {
    pub name: String,
    pub active: usize,
    pub max_concurrent: usize,
    pub waiting: usize,
    pub peak_active: usize,
    pub total_processed: u64,
    pub total_failed: u64,
}

/// Tracks statistics for the slot pool.
#[derive(Debug, Default)]
struct PoolStats {
    active: AtomicU64,
    waiting: AtomicU64,
    peak_active: AtomicU64,
    total_processed: AtomicU64,
    total_failed: AtomicU64,
}

impl PoolStats {
    fn to_status(&self, name: &str, max_concurrent: usize) -> PoolStatus {
        PoolStatus {
            name: name.to_string(),
            active: self.active.load(Ordering::Relaxed) as usize,
            max_concurrent,
            waiting: self.waiting.load(Ordering::Relaxed) as usize,
            peak_active: self.peak_active.load(Ordering::Relaxed) as usize,
            total_processed: self.total_processed.load(Ordering::Relaxed),
            total_failed: self.total_failed.load(Ordering::Relaxed),
        }
    }
}

/// Counting semaphore bounding concurrent item processing.
#[derive(Debug)]
pub struct ConcurrencyLimiter {
    name: String,
    capacity: usize,
    semaphore: Arc<Semaphore>,
    stats: Arc<PoolStats>,
}

/// A held processing slot. Dropping it returns the slot to the pool.
#[derive(Debug)]
pub struct LimiterPermit {
    _permit: OwnedSemaphorePermit,
    stats: Arc<PoolStats>,
}

impl LimiterPermit {
    /// Count the guarded work as successful.
    pub fn record_success(&self) {
        self.stats.total_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Count the guarded work as failed.
    pub fn record_failure(&self) {
        self.stats.total_failed.fetch_add(1, Ordering::Relaxed);
    }
}

impl Drop for LimiterPermit {
    fn drop(&mut self) {
        self.stats.active.fetch_sub(1, Ordering::Relaxed);
    }
}

impl ConcurrencyLimiter {
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            capacity,
            semaphore: Arc::new(Semaphore::new(capacity)),
            stats: Arc::new(PoolStats::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Wait for a free slot.
    pub async fn acquire(&self) -> Result<LimiterPermit, DispatcherError> {
        self.stats.waiting.fetch_add(1, Ordering::Relaxed);
        let permit = Arc::clone(&self.semaphore).acquire_owned().await;
        self.stats.waiting.fetch_sub(1, Ordering::Relaxed);

        let permit = permit.map_err(|_| DispatcherError::LimiterClosed)?;
        let active = self.stats.active.fetch_add(1, Ordering::Relaxed) + 1;
        self.stats.peak_active.fetch_max(active, Ordering::Relaxed);

        Ok(LimiterPermit {
            _permit: permit,
            stats: Arc::clone(&self.stats),
        })
    }

    /// Stop handing out slots; pending and future `acquire` calls fail.
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn status(&self) -> PoolStatus {
        self.stats.to_status(&self.name, self.capacity)
    }
}
