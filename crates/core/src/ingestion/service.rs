//! Submission and status queries, independent of transport.

use std::sync::Arc;

use tracing::{debug, info};

use crate::metrics;
use crate::scheduler::{BatchQueue, QueueEntry, SchedulerConfig};

use super::store::{IngestionError, IngestionStore, NewIngestion};
use super::types::{Batch, IngestionStatus, ItemId, SubmitRequest};

/// Split `ids` into consecutive batches of at most `batch_size` items.
///
/// Concatenating the batches' ids reproduces the input. An empty input
/// yields no batches.
pub fn split_into_batches(ids: Vec<ItemId>, batch_size: usize) -> Vec<Batch> {
    let batch_size = batch_size.max(1);
    ids.chunks(batch_size)
        .map(|chunk| Batch::new(chunk.to_vec()))
        .collect()
}

/// Accepts submissions and answers status queries.
pub struct IngestionService {
    batch_size: usize,
    max_ids_per_submission: usize,
    store: Arc<dyn IngestionStore>,
    queue: Arc<BatchQueue>,
}

impl IngestionService {
    pub fn new(
        config: &SchedulerConfig,
        store: Arc<dyn IngestionStore>,
        queue: Arc<BatchQueue>,
    ) -> Self {
        Self {
            batch_size: config.batch_size,
            max_ids_per_submission: config.max_ids_per_submission,
            store,
            queue,
        }
    }

    /// Register a submission and queue its batches for dispatch.
    ///
    /// The ingestion is stored before any batch is queued, so the dispatcher
    /// never sees a batch the registry does not know.
    pub fn submit(&self, request: SubmitRequest) -> Result<String, IngestionError> {
        if self.max_ids_per_submission > 0 && request.ids.len() > self.max_ids_per_submission {
            metrics::SUBMISSIONS_REJECTED.inc();
            return Err(IngestionError::Validation(format!(
                "too many ids: {} (max {})",
                request.ids.len(),
                self.max_ids_per_submission
            )));
        }

        let item_count = request.ids.len();
        let priority = request.priority;
        let ingestion = self.store.create(NewIngestion {
            priority,
            batches: split_into_batches(request.ids, self.batch_size),
        })?;

        for (index, batch) in ingestion.batches.iter().enumerate() {
            self.queue
                .push(QueueEntry::new(&ingestion.id, &batch.batch_id, index, priority));
        }

        metrics::SUBMISSIONS_TOTAL
            .with_label_values(&[priority.as_str()])
            .inc();
        metrics::ITEMS_SUBMITTED.inc_by(item_count as u64);

        info!(
            "Accepted ingestion {} ({} items in {} batches, priority {})",
            ingestion.id,
            item_count,
            ingestion.batches.len(),
            priority
        );

        Ok(ingestion.id)
    }

    /// Current status of an ingestion, with the overall status derived from
    /// its batches at read time.
    pub fn get_status(&self, id: &str) -> Result<IngestionStatus, IngestionError> {
        let ingestion = self
            .store
            .get(id)?
            .ok_or_else(|| IngestionError::NotFound(id.to_string()))?;
        debug!("Status query for ingestion {}", id);
        Ok(ingestion.into())
    }

    pub fn queue_depth(&self) -> usize {
        self.queue.len()
    }
}
