//! Batch scheduling.
//!
//! The dispatcher pops batches from the priority queue, waits on the rate
//! gate, and runs their items through the item processor with concurrency
//! bounded by the limiter.

mod config;
mod dispatcher;
mod limiter;
mod processor;
mod queue;
mod rate_gate;
mod types;

pub use config::{RetryConfig, SchedulerConfig};
pub use dispatcher::BatchDispatcher;
pub use limiter::{ConcurrencyLimiter, LimiterPermit, PoolStatus};
pub use processor::{ItemProcessor, ProcessedItem, ProcessingError, SimulatedItemProcessor};
pub use queue::{BatchQueue, QueueEntry};
pub use rate_gate::RateGate;
pub use types::{DispatchOutcome, DispatcherError, DispatcherStatus};
