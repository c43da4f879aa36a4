use std::sync::Arc;

use ingestor_core::{
    BatchDispatcher, BatchQueue, ConcurrencyLimiter, Config, InMemoryIngestionStore,
    IngestionService, IngestionStore, ItemProcessor, RateGate,
};

/// Shared application state
pub struct AppState {
    config: Config,
    ingestion: Arc<IngestionService>,
    dispatcher: Arc<BatchDispatcher>,
}

impl AppState {
    pub fn new(
        config: Config,
        ingestion: Arc<IngestionService>,
        dispatcher: Arc<BatchDispatcher>,
    ) -> Self {
        Self {
            config,
            ingestion,
            dispatcher,
        }
    }

    /// Wire the in-memory registry, queue, rate gate and limiter around
    /// `processor`. The dispatcher is created stopped.
    pub fn build(config: Config, processor: Arc<dyn ItemProcessor>) -> Self {
        let scheduler = &config.scheduler;

        let store: Arc<dyn IngestionStore> = Arc::new(InMemoryIngestionStore::new());
        let queue = Arc::new(BatchQueue::new());
        let gate = Arc::new(RateGate::new(scheduler.min_dispatch_interval()));
        let limiter = Arc::new(ConcurrencyLimiter::new(
            "items",
            scheduler.max_concurrent_items,
        ));

        let ingestion = Arc::new(IngestionService::new(
            scheduler,
            Arc::clone(&store),
            Arc::clone(&queue),
        ));
        let dispatcher = Arc::new(BatchDispatcher::new(
            scheduler.clone(),
            store,
            queue,
            gate,
            limiter,
            processor,
        ));

        Self::new(config, ingestion, dispatcher)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn ingestion(&self) -> &IngestionService {
        self.ingestion.as_ref()
    }

    pub fn dispatcher(&self) -> &BatchDispatcher {
        self.dispatcher.as_ref()
    }
}
