//! Testing utilities and mock implementations.
//!
//! # Example
//!
//! ```rust,ignore
//! use ingestor_core::testing::{fixtures, MockItemProcessor};
//!
//! let processor = MockItemProcessor::new().with_latency(Duration::from_secs(1));
//! let config = fixtures::fast_scheduler_config();
//! ```

mod mock_processor;

pub use mock_processor::{MockItemProcessor, ProcessorCalls, RecordedAttempt};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::time::Duration;

    use crate::ingestion::ItemId;
    use crate::scheduler::SchedulerConfig;

    /// Integer item ids `1..=count`.
    pub fn item_ids(count: i64) -> Vec<ItemId> {
        (1..=count).map(ItemId::Int).collect()
    }

    /// Scheduler settings with short intervals, for tests on a real clock.
    pub fn fast_scheduler_config() -> SchedulerConfig {
        SchedulerConfig {
            min_dispatch_interval_ms: 20,
            item_latency_ms: 1,
            idle_poll_interval_ms: 5,
            ..Default::default()
        }
    }

    /// Scheduler settings with the given dispatch interval and no item latency.
    pub fn scheduler_config_with_interval(interval: Duration) -> SchedulerConfig {
        SchedulerConfig {
            item_latency_ms: 0,
            ..Default::default()
        }
        .with_min_dispatch_interval(interval)
    }
}
