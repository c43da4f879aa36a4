//! Mock item processor for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use crate::ingestion::ItemId;
use crate::scheduler::{ItemProcessor, ProcessedItem, ProcessingError};

/// A recorded processing attempt for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedAttempt {
    pub item: ItemId,
    pub started_at: Instant,
    pub success: bool,
}

/// Shared view of everything a [`MockItemProcessor`] has seen.
///
/// Cloning is cheap; clones observe the same processor.
#[derive(Debug, Clone, Default)]
pub struct ProcessorCalls {
    attempts: Arc<Mutex<Vec<RecordedAttempt>>>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

impl ProcessorCalls {
    /// All attempts in start order.
    pub fn recorded(&self) -> Vec<RecordedAttempt> {
        self.attempts.lock().unwrap().clone()
    }

    /// Items in the order their attempts started (retries repeat the item).
    pub fn processed(&self) -> Vec<ItemId> {
        self.recorded().into_iter().map(|a| a.item).collect()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous `process` calls observed.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

/// Decrements the in-flight counter even when the call is cancelled.
struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Mock implementation of the ItemProcessor trait.
///
/// Provides controllable behavior for testing:
/// - Fixed latency per call (zero by default)
/// - Permanently failing items
/// - Items that fail a given number of times, then succeed
/// - Items that panic inside `process`
/// - Records call order and peak concurrency
///
/// # Example
///
/// ```rust,ignore
/// use ingestor_core::testing::MockItemProcessor;
///
/// let processor = MockItemProcessor::new()
///     .with_latency(Duration::from_secs(1))
///     .with_failing_ids(vec![ItemId::Int(4)]);
/// let calls = processor.calls();
///
/// // ... hand `processor` to a BatchDispatcher and run it ...
///
/// assert!(calls.peak_in_flight() <= 3);
/// ```
#[derive(Debug, Default)]
pub struct MockItemProcessor {
    latency: Duration,
    failing: HashSet<ItemId>,
    panicking: HashSet<ItemId>,
    /// Remaining failures per item before it starts succeeding.
    transient: Mutex<HashMap<ItemId, u32>>,
    calls: ProcessorCalls,
}

impl MockItemProcessor {
    /// Create a mock that succeeds instantly.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Items that fail on every attempt.
    pub fn with_failing_ids(mut self, ids: Vec<ItemId>) -> Self {
        self.failing.extend(ids);
        self
    }

    /// Items whose `process` call panics.
    pub fn with_panicking_ids(mut self, ids: Vec<ItemId>) -> Self {
        self.panicking.extend(ids);
        self
    }

    /// Fail `item` for its first `times` attempts.
    pub fn with_transient_failures(self, item: ItemId, times: u32) -> Self {
        self.transient.lock().unwrap().insert(item, times);
        self
    }

    /// Handle for inspecting calls after the processor has been moved.
    pub fn calls(&self) -> ProcessorCalls {
        self.calls.clone()
    }

    fn should_fail(&self, item: &ItemId) -> bool {
        if self.failing.contains(item) {
            return true;
        }
        let mut transient = self.transient.lock().unwrap();
        match transient.get_mut(item) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl ItemProcessor for MockItemProcessor {
    async fn process(&self, item: &ItemId) -> Result<ProcessedItem, ProcessingError> {
        let calls = &self.calls;
        let current = calls.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        calls.peak_in_flight.fetch_max(current, Ordering::SeqCst);
        let _guard = InFlightGuard(&calls.in_flight);

        let fail = self.should_fail(item);
        calls.attempts.lock().unwrap().push(RecordedAttempt {
            item: item.clone(),
            started_at: Instant::now(),
            success: !fail,
        });

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if self.panicking.contains(item) {
            panic!("mock processor panicked on item {}", item);
        }

        if fail {
            return Err(ProcessingError::Failed {
                item: item.clone(),
                reason: "mock failure".to_string(),
            });
        }

        Ok(ProcessedItem {
            id: item.clone(),
            data: "processed".to_string(),
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
