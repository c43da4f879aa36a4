//! Scheduler configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for batching, dispatch pacing and item processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Maximum number of items per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Maximum items processed concurrently across all batches.
    #[serde(default = "default_max_concurrent_items")]
    pub max_concurrent_items: usize,

    /// Minimum time between the start of two batch dispatches (milliseconds).
    #[serde(default = "default_min_dispatch_interval")]
    pub min_dispatch_interval_ms: u64,

    /// Simulated latency of one item (milliseconds).
    #[serde(default = "default_item_latency")]
    pub item_latency_ms: u64,

    /// Per-attempt timeout for one item (milliseconds).
    #[serde(default = "default_item_timeout")]
    pub item_timeout_ms: u64,

    /// Fallback wake-up interval of the dispatch loop when the queue is empty
    /// (milliseconds). Pushes wake the loop immediately.
    #[serde(default = "default_idle_poll_interval")]
    pub idle_poll_interval_ms: u64,

    /// Process the items of one batch concurrently (still bounded by
    /// `max_concurrent_items`) instead of one after another.
    #[serde(default)]
    pub parallel_items: bool,

    /// Largest accepted submission (0 = unlimited).
    #[serde(default)]
    pub max_ids_per_submission: usize,

    /// Start the dispatch loop together with the server.
    #[serde(default = "default_autostart")]
    pub autostart: bool,

    /// Retry policy for failed items.
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Retry configuration for item processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per item, including the first (1 = no retry).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry (milliseconds).
    #[serde(default = "default_retry_delay")]
    pub initial_delay_ms: u64,

    /// Upper bound for the retry delay (milliseconds).
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Exponential backoff multiplier.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_batch_size() -> usize {
    3
}

fn default_max_concurrent_items() -> usize {
    3
}

fn default_min_dispatch_interval() -> u64 {
    5000 // 5 seconds
}

fn default_item_latency() -> u64 {
    1000 // 1 second
}

fn default_item_timeout() -> u64 {
    30_000 // 30 seconds
}

fn default_idle_poll_interval() -> u64 {
    100
}

fn default_autostart() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    1
}

fn default_retry_delay() -> u64 {
    500
}

fn default_max_delay() -> u64 {
    10_000 // 10 seconds
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_retry_delay(),
            max_delay_ms: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetryConfig {
    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let delay = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        Duration::from_millis(delay.min(self.max_delay_ms as f64) as u64)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_concurrent_items: default_max_concurrent_items(),
            min_dispatch_interval_ms: default_min_dispatch_interval(),
            item_latency_ms: default_item_latency(),
            item_timeout_ms: default_item_timeout(),
            idle_poll_interval_ms: default_idle_poll_interval(),
            parallel_items: false,
            max_ids_per_submission: 0,
            autostart: default_autostart(),
            retry: RetryConfig::default(),
        }
    }
}

impl SchedulerConfig {
    pub fn min_dispatch_interval(&self) -> Duration {
        Duration::from_millis(self.min_dispatch_interval_ms)
    }

    pub fn item_latency(&self) -> Duration {
        Duration::from_millis(self.item_latency_ms)
    }

    pub fn item_timeout(&self) -> Duration {
        Duration::from_millis(self.item_timeout_ms)
    }

    pub fn idle_poll_interval(&self) -> Duration {
        Duration::from_millis(self.idle_poll_interval_ms)
    }

    /// Sets the batch size.
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Sets the concurrency limit for item processing.
    pub fn with_max_concurrent_items(mut self, max: usize) -> Self {
        self.max_concurrent_items = max;
        self
    }

    /// Sets the minimum dispatch interval.
    pub fn with_min_dispatch_interval(mut self, interval: Duration) -> Self {
        self.min_dispatch_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Enables concurrent processing of items within a batch.
    pub fn with_parallel_items(mut self, enabled: bool) -> Self {
        self.parallel_items = enabled;
        self
    }
}
