//! Batch dispatcher.
//!
//! Drives queued batches through their lifecycle, one batch per cycle:
//! - Selecting: pop the highest-priority, oldest batch
//! - Gating: wait for the rate gate to grant a turn
//! - Triggered: mark the batch and process its items under the limiter
//! - Completed/Failed: record the terminal status

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use futures::FutureExt;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::ingestion::{BatchStatus, BatchUpdate, IngestionStore, ItemId};
use crate::metrics;

use super::config::SchedulerConfig;
use super::limiter::ConcurrencyLimiter;
use super::processor::{ItemProcessor, ProcessedItem, ProcessingError};
use super::queue::{BatchQueue, QueueEntry};
use super::rate_gate::RateGate;
use super::types::{DispatchOutcome, DispatcherError, DispatcherStatus};

#[derive(Debug, Default)]
struct DispatchStats {
    dispatched: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

/// Components shared between the dispatcher handle and its loop task.
struct DispatchContext {
    config: SchedulerConfig,
    store: Arc<dyn IngestionStore>,
    queue: Arc<BatchQueue>,
    gate: Arc<RateGate>,
    limiter: Arc<ConcurrencyLimiter>,
    processor: Arc<dyn ItemProcessor>,
    stats: DispatchStats,
}

/// Clears the running flag if the loop task exits without being stopped.
struct LoopExitGuard {
    running: Arc<AtomicBool>,
    stopped: bool,
}

impl Drop for LoopExitGuard {
    fn drop(&mut self) {
        if !self.stopped {
            error!("Dispatch loop exited unexpectedly");
            self.running.store(false, Ordering::SeqCst);
        }
    }
}

/// The batch dispatcher - a single long-lived consumer of the batch queue.
pub struct BatchDispatcher {
    ctx: Arc<DispatchContext>,

    // Runtime state
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
}

impl BatchDispatcher {
    /// Create a new dispatcher. Nothing runs until [`start`](Self::start).
    pub fn new(
        config: SchedulerConfig,
        store: Arc<dyn IngestionStore>,
        queue: Arc<BatchQueue>,
        gate: Arc<RateGate>,
        limiter: Arc<ConcurrencyLimiter>,
        processor: Arc<dyn ItemProcessor>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            ctx: Arc::new(DispatchContext {
                config,
                store,
                queue,
                gate,
                limiter,
                processor,
                stats: DispatchStats::default(),
            }),
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
            loop_handle: Mutex::new(None),
        }
    }

    /// Start the dispatch loop (spawns a background task).
    ///
    /// Waits for a concurrent [`stop`](Self::stop) to finish first, so at most
    /// one loop task exists at a time.
    pub async fn start(&self) {
        let mut loop_handle = self.loop_handle.lock().await;
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Dispatcher already running");
            return;
        }

        info!(
            "Starting batch dispatcher (processor: {})",
            self.ctx.processor.name()
        );

        *loop_handle = Some(self.spawn_dispatch_loop());

        info!("Batch dispatcher started");
    }

    /// Stop the dispatch loop, waiting for the in-flight batch to finish.
    pub async fn stop(&self) {
        let mut loop_handle = self.loop_handle.lock().await;
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Dispatcher not running");
            return;
        }

        info!("Stopping batch dispatcher");

        let _ = self.shutdown_tx.send(());

        if let Some(handle) = loop_handle.take() {
            if let Err(e) = handle.await {
                error!("Dispatch loop terminated abnormally: {}", e);
            }
        }

        info!("Batch dispatcher stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Get current dispatcher status.
    pub fn status(&self) -> DispatcherStatus {
        let ctx = &self.ctx;

        let batches = ctx.store.batch_counts().unwrap_or_else(|e| {
            warn!("Failed to count batches: {}", e);
            Default::default()
        });

        DispatcherStatus {
            running: self.is_running(),
            queued_batches: ctx.queue.len(),
            next_dispatch_in_ms: ctx.gate.next_turn_in().as_millis() as u64,
            item_pool: ctx.limiter.status(),
            batches_dispatched: ctx.stats.dispatched.load(Ordering::Relaxed),
            batches_completed: ctx.stats.completed.load(Ordering::Relaxed),
            batches_failed: ctx.stats.failed.load(Ordering::Relaxed),
            batches,
        }
    }

    /// Run one dispatch cycle if a batch is queued.
    ///
    /// Returns `Ok(None)` when the queue is empty.
    pub async fn step(&self) -> Result<Option<DispatchOutcome>, DispatcherError> {
        self.ctx.step().await
    }

    fn spawn_dispatch_loop(&self) -> JoinHandle<()> {
        let ctx = Arc::clone(&self.ctx);
        let running = Arc::clone(&self.running);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let idle_poll = ctx.config.idle_poll_interval();

        tokio::spawn(async move {
            info!("Dispatch loop started");
            let mut guard = LoopExitGuard {
                running: Arc::clone(&running),
                stopped: false,
            };
            loop {
                tokio::select! {
                    // A pending shutdown always wins over queued work.
                    biased;
                    _ = shutdown_rx.recv() => {
                        info!("Dispatch loop received shutdown signal");
                        break;
                    }
                    ready = ctx.queue.wait_for_entry(idle_poll) => {
                        if !running.load(Ordering::SeqCst) {
                            break;
                        }
                        if !ready {
                            continue;
                        }
                        match ctx.step().await {
                            Ok(Some(outcome)) => debug!(
                                "Batch {} of ingestion {} finished as {}",
                                outcome.batch_id, outcome.ingestion_id, outcome.status
                            ),
                            Ok(None) => {}
                            Err(e) => warn!("Dispatch error: {}", e),
                        }
                    }
                }
            }
            guard.stopped = true;
            info!("Dispatch loop stopped");
        })
    }
}

impl DispatchContext {
    async fn step(&self) -> Result<Option<DispatchOutcome>, DispatcherError> {
        let Some(entry) = self.queue.pop_next() else {
            return Ok(None);
        };
        self.stats.dispatched.fetch_add(1, Ordering::Relaxed);

        self.dispatch(entry).await.map(Some)
    }

    async fn dispatch(&self, entry: QueueEntry) -> Result<DispatchOutcome, DispatcherError> {
        let popped_at = Instant::now();
        let triggered_at = self.gate.wait_turn().await;
        metrics::RATE_GATE_WAIT
            .with_label_values(&[])
            .observe((triggered_at - popped_at).as_secs_f64());

        let batch = self.store.update_batch_status(
            &entry.ingestion_id,
            &entry.batch_id,
            BatchUpdate::Triggered,
        )?;

        debug!(
            "Triggered batch {} ({} items, priority {}) of ingestion {}",
            batch.batch_id,
            batch.ids.len(),
            entry.priority,
            entry.ingestion_id
        );

        let results = if self.config.parallel_items {
            join_all(batch.ids.iter().map(|item| self.process_item(item))).await
        } else {
            let mut results = Vec::with_capacity(batch.ids.len());
            for item in &batch.ids {
                results.push(self.process_item(item).await);
            }
            results
        };

        let mut limiter_closed = false;
        let mut items_processed = 0;
        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok(Ok(_)) => items_processed += 1,
                Ok(Err(e)) => failures.push(e.to_string()),
                Err(e) => {
                    limiter_closed = true;
                    failures.push(e.to_string());
                }
            }
        }

        let update = match failures.first() {
            None => BatchUpdate::Completed,
            Some(first) => BatchUpdate::Failed {
                error: first.clone(),
            },
        };
        let batch = self
            .store
            .update_batch_status(&entry.ingestion_id, &entry.batch_id, update)?;

        let finished_at = Instant::now();
        let result_label = batch.status.as_str();
        metrics::BATCHES_DISPATCHED
            .with_label_values(&[result_label])
            .inc();
        metrics::BATCH_DURATION
            .with_label_values(&[result_label])
            .observe((finished_at - triggered_at).as_secs_f64());

        if batch.status == BatchStatus::Failed {
            self.stats.failed.fetch_add(1, Ordering::Relaxed);
            warn!(
                "Batch {} of ingestion {} failed: {} of {} items failed ({})",
                batch.batch_id,
                entry.ingestion_id,
                failures.len(),
                batch.ids.len(),
                failures.join("; ")
            );
        } else {
            self.stats.completed.fetch_add(1, Ordering::Relaxed);
            debug!("Completed batch {}", batch.batch_id);
        }

        if limiter_closed {
            return Err(DispatcherError::LimiterClosed);
        }

        Ok(DispatchOutcome {
            ingestion_id: entry.ingestion_id,
            batch_id: batch.batch_id,
            status: batch.status,
            items_processed,
            items_failed: failures.len(),
            triggered_at,
            finished_at,
        })
    }

    /// Process one item, retrying per the retry policy.
    ///
    /// The slot is released between attempts, so backoff never holds
    /// capacity. The outer error means no slot could be acquired at all.
    async fn process_item(
        &self,
        item: &ItemId,
    ) -> Result<Result<ProcessedItem, ProcessingError>, DispatcherError> {
        let retry = &self.config.retry;
        let mut attempt = 1;

        loop {
            match self.attempt_item(item).await? {
                Ok(processed) => return Ok(Ok(processed)),
                Err(e) if attempt < retry.max_attempts => {
                    let delay = retry.delay_after(attempt);
                    warn!(
                        "Item {} failed (attempt {}/{}), retrying in {:?}: {}",
                        item, attempt, retry.max_attempts, delay, e
                    );
                    metrics::ITEM_RETRIES.inc();
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Ok(Err(e)),
            }
        }
    }

    async fn attempt_item(
        &self,
        item: &ItemId,
    ) -> Result<Result<ProcessedItem, ProcessingError>, DispatcherError> {
        let permit = self.limiter.acquire().await?;

        let attempt =
            tokio::time::timeout(self.config.item_timeout(), self.processor.process(item));
        let result = match AssertUnwindSafe(attempt).catch_unwind().await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ProcessingError::Timeout {
                item: item.clone(),
                timeout_ms: self.config.item_timeout_ms,
            }),
            Err(panic) => {
                error!(
                    "Item processor panicked on item {}: {}",
                    item,
                    panic_message(panic.as_ref())
                );
                Err(ProcessingError::Failed {
                    item: item.clone(),
                    reason: "processor panicked".to_string(),
                })
            }
        };

        let label = match &result {
            Ok(_) => {
                permit.record_success();
                "success"
            }
            Err(ProcessingError::Timeout { .. }) => {
                permit.record_failure();
                "timeout"
            }
            Err(ProcessingError::Failed { .. }) => {
                permit.record_failure();
                "failed"
            }
        };
        metrics::ITEMS_PROCESSED.with_label_values(&[label]).inc();
        debug!("Processed item {} ({})", item, label);

        Ok(result)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
