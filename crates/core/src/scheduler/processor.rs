//! Item processing.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ingestion::ItemId;

/// Error type for item processing.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProcessingError {
    /// The processor reported a failure.
    #[error("processing item {item} failed: {reason}")]
    Failed { item: ItemId, reason: String },

    /// The attempt exceeded the configured timeout.
    #[error("processing item {item} timed out after {timeout_ms}ms")]
    Timeout { item: ItemId, timeout_ms: u64 },
}

/// Result of processing a single item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedItem {
    pub id: ItemId,
    pub data: String,
}

/// Performs the unit of work for one item.
#[async_trait]
pub trait ItemProcessor: Send + Sync {
    /// Process one item.
    async fn process(&self, item: &ItemId) -> Result<ProcessedItem, ProcessingError>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Stand-in for an external call with fixed latency.
#[derive(Debug, Clone)]
pub struct SimulatedItemProcessor {
    latency: Duration,
}

impl SimulatedItemProcessor {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

#[async_trait]
impl ItemProcessor for SimulatedItemProcessor {
    async fn process(&self, item: &ItemId) -> Result<ProcessedItem, ProcessingError> {
        tokio::time::sleep(self.latency).await;
        Ok(ProcessedItem {
            id: item.clone(),
            data: "processed".to_string(),
        })
    }

    fn name(&self) -> &'static str {
        "simulated"
    }
}
