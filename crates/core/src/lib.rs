pub mod config;
pub mod ingestion;
pub mod metrics;
pub mod scheduler;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, ServerConfig,
};
pub use ingestion::{
    split_into_batches, Batch, BatchCounts, BatchStatus, InMemoryIngestionStore, Ingestion,
    IngestionError, IngestionService, IngestionStatus, IngestionStore, ItemId, Priority,
    SubmitRequest,
};
pub use scheduler::{
    BatchDispatcher, BatchQueue, ConcurrencyLimiter, DispatchOutcome, DispatcherError,
    DispatcherStatus, ItemProcessor, PoolStatus, ProcessingError, RateGate, RetryConfig,
    SchedulerConfig, SimulatedItemProcessor,
};
