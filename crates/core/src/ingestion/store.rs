//! Ingestion storage trait and the in-memory registry.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;
use thiserror::Error;

use super::{Batch, BatchCounts, BatchStatus, BatchUpdate, Ingestion, Priority};

/// Error type for ingestion operations.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Submission input was rejected; nothing was created.
    #[error("invalid submission: {0}")]
    Validation(String),

    /// Ingestion not found.
    #[error("ingestion not found: {0}")]
    NotFound(String),

    /// Batch not found within an existing ingestion.
    #[error("batch {batch_id} not found in ingestion {ingestion_id}")]
    BatchNotFound {
        ingestion_id: String,
        batch_id: String,
    },

    /// Attempted a non-monotonic batch status change.
    #[error("cannot move batch {batch_id} from {from} to {to}")]
    InvalidTransition {
        batch_id: String,
        from: BatchStatus,
        to: BatchStatus,
    },

    /// Storage backend failure.
    #[error("storage error: {0}")]
    Storage(String),
}

/// Request to register a new ingestion with pre-split batches.
#[derive(Debug, Clone)]
pub struct NewIngestion {
    pub priority: Priority,
    pub batches: Vec<Batch>,
}

/// Trait for ingestion storage backends.
pub trait IngestionStore: Send + Sync {
    /// Register a new ingestion and return the stored record.
    fn create(&self, request: NewIngestion) -> Result<Ingestion, IngestionError>;

    /// Get an ingestion by ID.
    fn get(&self, id: &str) -> Result<Option<Ingestion>, IngestionError>;

    /// Apply a status change to one batch, enforcing monotonic transitions.
    fn update_batch_status(
        &self,
        ingestion_id: &str,
        batch_id: &str,
        update: BatchUpdate,
    ) -> Result<Batch, IngestionError>;

    /// Number of registered ingestions.
    fn count(&self) -> Result<usize, IngestionError>;

    /// Batch totals per status across all ingestions.
    fn batch_counts(&self) -> Result<BatchCounts, IngestionError>;
}

/// Process-local ingestion registry.
///
/// Records live for the lifetime of the process and are never evicted.
#[derive(Debug, Default)]
pub struct InMemoryIngestionStore {
    ingestions: RwLock<HashMap<String, Ingestion>>,
}

impl InMemoryIngestionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> IngestionError {
    IngestionError::Storage("ingestion registry lock poisoned".to_string())
}

impl IngestionStore for InMemoryIngestionStore {
    fn create(&self, request: NewIngestion) -> Result<Ingestion, IngestionError> {
        let ingestion = Ingestion {
            id: uuid::Uuid::new_v4().to_string(),
            priority: request.priority,
            created_at: Utc::now(),
            batches: request.batches,
        };

        let mut ingestions = self.ingestions.write().map_err(poisoned)?;
        ingestions.insert(ingestion.id.clone(), ingestion.clone());
        Ok(ingestion)
    }

    fn get(&self, id: &str) -> Result<Option<Ingestion>, IngestionError> {
        let ingestions = self.ingestions.read().map_err(poisoned)?;
        Ok(ingestions.get(id).cloned())
    }

    fn update_batch_status(
        &self,
        ingestion_id: &str,
        batch_id: &str,
        update: BatchUpdate,
    ) -> Result<Batch, IngestionError> {
        let mut ingestions = self.ingestions.write().map_err(poisoned)?;

        let ingestion = ingestions
            .get_mut(ingestion_id)
            .ok_or_else(|| IngestionError::NotFound(ingestion_id.to_string()))?;

        let batch = ingestion
            .batches
            .iter_mut()
            .find(|b| b.batch_id == batch_id)
            .ok_or_else(|| IngestionError::BatchNotFound {
                ingestion_id: ingestion_id.to_string(),
                batch_id: batch_id.to_string(),
            })?;

        let target = update.target_status();
        if !batch.status.can_transition_to(target) {
            return Err(IngestionError::InvalidTransition {
                batch_id: batch_id.to_string(),
                from: batch.status,
                to: target,
            });
        }

        let now = Utc::now();
        match update {
            BatchUpdate::Triggered => {
                batch.triggered_at = Some(now);
            }
            BatchUpdate::Completed => {
                batch.completed_at = Some(now);
            }
            BatchUpdate::Failed { error } => {
                batch.completed_at = Some(now);
                batch.error = Some(error);
            }
        }
        batch.status = target;

        Ok(batch.clone())
    }

    fn count(&self) -> Result<usize, IngestionError> {
        let ingestions = self.ingestions.read().map_err(poisoned)?;
        Ok(ingestions.len())
    }

    fn batch_counts(&self) -> Result<BatchCounts, IngestionError> {
        let ingestions = self.ingestions.read().map_err(poisoned)?;
        let mut counts = BatchCounts::default();
        for batch in ingestions.values().flat_map(|i| i.batches.iter()) {
            counts.record(batch.status);
        }
        Ok(counts)
    }
}
