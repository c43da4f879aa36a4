//! Ingestion registry and submission handling.

mod service;
mod store;
mod types;

pub use service::{split_into_batches, IngestionService};
pub use store::{InMemoryIngestionStore, IngestionError, IngestionStore, NewIngestion};
pub use types::{
    overall_status, Batch, BatchCounts, BatchStatus, BatchUpdate, Ingestion, IngestionStatus,
    ItemId, Priority, SubmitRequest,
};
