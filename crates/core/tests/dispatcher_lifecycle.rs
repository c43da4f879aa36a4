//! Dispatcher lifecycle integration tests.
//!
//! These tests drive submissions through the running dispatch loop on a
//! paused clock: yet_to_start -> triggered -> completed/failed

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use ingestor_core::{
    testing::{fixtures, MockItemProcessor, ProcessorCalls},
    BatchDispatcher, BatchQueue, BatchStatus, ConcurrencyLimiter, InMemoryIngestionStore,
    IngestionService, ItemId, Priority, RateGate, SchedulerConfig, SubmitRequest,
};

/// Test helper wiring the full scheduler around a mock processor.
struct TestHarness {
    service: IngestionService,
    dispatcher: BatchDispatcher,
    calls: ProcessorCalls,
}

impl TestHarness {
    fn new(config: SchedulerConfig, processor: MockItemProcessor) -> Self {
        let store = Arc::new(InMemoryIngestionStore::new());
        let queue = Arc::new(BatchQueue::new());
        let gate = Arc::new(RateGate::new(config.min_dispatch_interval()));
        let limiter = Arc::new(ConcurrencyLimiter::new(
            "items",
            config.max_concurrent_items,
        ));
        let calls = processor.calls();

        let service = IngestionService::new(&config, store.clone(), Arc::clone(&queue));
        let dispatcher =
            BatchDispatcher::new(config, store, queue, gate, limiter, Arc::new(processor));

        Self {
            service,
            dispatcher,
            calls,
        }
    }

    fn submit(&self, ids: Vec<ItemId>, priority: Priority) -> String {
        self.service
            .submit(SubmitRequest { ids, priority })
            .expect("submission should be accepted")
    }

    fn status(&self, id: &str) -> BatchStatus {
        self.service.get_status(id).expect("ingestion exists").status
    }

    /// Advance the paused clock until every given ingestion is terminal.
    async fn wait_until_done(&self, ids: &[&str]) {
        for _ in 0..10_000 {
            let done = ids.iter().all(|id| {
                matches!(self.status(id), BatchStatus::Completed | BatchStatus::Failed)
            });
            if done {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("ingestions did not finish");
    }
}

fn ids(range: std::ops::RangeInclusive<i64>) -> Vec<ItemId> {
    range.map(ItemId::Int).collect()
}

#[tokio::test(start_paused = true)]
async fn test_full_lifecycle_through_loop() {
    let harness = TestHarness::new(
        SchedulerConfig::default(),
        MockItemProcessor::new().with_latency(Duration::from_secs(1)),
    );

    let id = harness.submit(fixtures::item_ids(5), Priority::Medium);
    assert_eq!(harness.status(&id), BatchStatus::NotStarted);

    harness.dispatcher.start().await;
    harness.wait_until_done(&[&id]).await;

    let status = harness.service.get_status(&id).unwrap();
    assert_eq!(status.status, BatchStatus::Completed);
    assert_eq!(status.batches.len(), 2);
    for batch in &status.batches {
        assert_eq!(batch.status, BatchStatus::Completed);
        assert!(batch.triggered_at.is_some());
        assert!(batch.completed_at.is_some());
    }
    assert_eq!(harness.calls.processed(), fixtures::item_ids(5));

    harness.dispatcher.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_dispatches_are_spaced_by_min_interval() {
    let interval = Duration::from_secs(5);
    let harness = TestHarness::new(
        fixtures::scheduler_config_with_interval(interval),
        MockItemProcessor::new(),
    );

    for _ in 0..4 {
        harness.submit(fixtures::item_ids(3), Priority::Medium);
    }

    let mut triggered = Vec::new();
    while let Some(outcome) = harness.dispatcher.step().await.unwrap() {
        triggered.push(outcome.triggered_at);
    }

    assert_eq!(triggered.len(), 4);
    for pair in triggered.windows(2) {
        assert!(pair[1] - pair[0] >= interval);
    }
}

#[tokio::test(start_paused = true)]
async fn test_loop_respects_min_interval() {
    let harness = TestHarness::new(
        fixtures::scheduler_config_with_interval(Duration::from_secs(5)),
        MockItemProcessor::new(),
    );

    let a = harness.submit(ids(1..=3), Priority::Low);
    let b = harness.submit(ids(4..=6), Priority::Low);
    let c = harness.submit(ids(7..=9), Priority::Low);

    harness.dispatcher.start().await;
    harness.wait_until_done(&[&a, &b, &c]).await;
    harness.dispatcher.stop().await;

    // First item of each batch starts when the batch is triggered.
    let starts: Vec<_> = harness
        .calls
        .recorded()
        .iter()
        .filter(|attempt| matches!(attempt.item, ItemId::Int(1 | 4 | 7)))
        .map(|attempt| attempt.started_at)
        .collect();
    assert_eq!(starts.len(), 3);
    for pair in starts.windows(2) {
        assert!(pair[1] - pair[0] >= Duration::from_secs(5));
    }
}

#[tokio::test(start_paused = true)]
async fn test_concurrency_never_exceeds_capacity() {
    let config = SchedulerConfig {
        batch_size: 10,
        max_concurrent_items: 3,
        parallel_items: true,
        ..Default::default()
    };
    let harness = TestHarness::new(
        config,
        MockItemProcessor::new().with_latency(Duration::from_secs(1)),
    );

    let a = harness.submit(fixtures::item_ids(10), Priority::High);
    let b = harness.submit(fixtures::item_ids(7), Priority::Low);

    harness.dispatcher.start().await;
    harness.wait_until_done(&[&a, &b]).await;
    harness.dispatcher.stop().await;

    assert_eq!(harness.calls.attempts(), 17);
    assert_eq!(harness.calls.peak_in_flight(), 3);
    assert_eq!(harness.dispatcher.status().item_pool.peak_active, 3);
}

#[tokio::test(start_paused = true)]
async fn test_high_priority_overtakes_queued_medium() {
    let harness = TestHarness::new(SchedulerConfig::default(), MockItemProcessor::new());

    let medium = harness.submit(ids(1..=3), Priority::Medium);
    let high = harness.submit(ids(101..=103), Priority::High);

    harness.dispatcher.start().await;
    harness.wait_until_done(&[&medium, &high]).await;
    harness.dispatcher.stop().await;

    let order = harness.calls.processed();
    assert_eq!(order[..3], ids(101..=103)[..]);
    assert_eq!(order[3..], ids(1..=3)[..]);
}

#[tokio::test(start_paused = true)]
async fn test_preemption_happens_between_batches() {
    let harness = TestHarness::new(SchedulerConfig::default(), MockItemProcessor::new());

    let medium = harness.submit(ids(1..=6), Priority::Medium);

    // First medium batch runs before the high submission arrives.
    harness.dispatcher.step().await.unwrap().unwrap();
    let high = harness.submit(ids(101..=103), Priority::High);

    let outcome = harness.dispatcher.step().await.unwrap().unwrap();
    assert_eq!(outcome.ingestion_id, high);
    let outcome = harness.dispatcher.step().await.unwrap().unwrap();
    assert_eq!(outcome.ingestion_id, medium);
    assert!(harness.dispatcher.step().await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_failure_does_not_stop_loop() {
    let processor = MockItemProcessor::new().with_failing_ids(vec![ItemId::Int(2)]);
    let harness = TestHarness::new(SchedulerConfig::default(), processor);

    let failing = harness.submit(ids(1..=3), Priority::High);
    let healthy = harness.submit(ids(10..=12), Priority::Medium);

    harness.dispatcher.start().await;
    harness.wait_until_done(&[&failing, &healthy]).await;
    harness.dispatcher.stop().await;

    let failed = harness.service.get_status(&failing).unwrap();
    assert_eq!(failed.status, BatchStatus::Failed);
    assert!(failed.batches[0].error.is_some());
    assert_eq!(harness.status(&healthy), BatchStatus::Completed);

    // Remaining items of the failed batch were still attempted.
    assert!(harness.calls.processed().contains(&ItemId::Int(3)));

    let status = harness.dispatcher.status();
    assert_eq!(status.batches_failed, 1);
    assert_eq!(status.batches_completed, 1);
}

#[tokio::test(start_paused = true)]
async fn test_status_visible_while_batch_in_flight() {
    let harness = TestHarness::new(
        SchedulerConfig::default(),
        MockItemProcessor::new().with_latency(Duration::from_secs(1)),
    );
    let id = harness.submit(ids(1..=6), Priority::Medium);

    harness.dispatcher.start().await;
    while harness.calls.attempts() == 0 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let status = harness.service.get_status(&id).unwrap();
    assert_eq!(status.status, BatchStatus::Triggered);
    assert_eq!(status.batches[0].status, BatchStatus::Triggered);
    assert_eq!(status.batches[1].status, BatchStatus::NotStarted);

    harness.wait_until_done(&[&id]).await;
    harness.dispatcher.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_stop_finishes_in_flight_batch() {
    let harness = TestHarness::new(
        SchedulerConfig::default(),
        MockItemProcessor::new().with_latency(Duration::from_secs(1)),
    );
    let id = harness.submit(ids(1..=6), Priority::Medium);

    harness.dispatcher.start().await;
    while harness.calls.attempts() == 0 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    harness.dispatcher.stop().await;
    assert!(!harness.dispatcher.is_running());

    let status = harness.service.get_status(&id).unwrap();
    assert_eq!(status.batches[0].status, BatchStatus::Completed);
    assert_eq!(status.batches[1].status, BatchStatus::NotStarted);
    assert_eq!(harness.dispatcher.status().queued_batches, 1);

    // Restarting picks up the remaining batch.
    harness.dispatcher.start().await;
    harness.wait_until_done(&[&id]).await;
    harness.dispatcher.stop().await;
    assert_eq!(harness.status(&id), BatchStatus::Completed);
}

#[tokio::test(start_paused = true)]
async fn test_submissions_while_running_wake_loop() {
    let harness = TestHarness::new(SchedulerConfig::default(), MockItemProcessor::new());
    harness.dispatcher.start().await;

    tokio::time::sleep(Duration::from_secs(1)).await;
    let id = harness.submit(ids(1..=2), Priority::Low);
    harness.wait_until_done(&[&id]).await;

    assert_eq!(harness.status(&id), BatchStatus::Completed);
    harness.dispatcher.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_panicking_processor_does_not_stop_loop() {
    let processor = MockItemProcessor::new().with_panicking_ids(vec![ItemId::Int(2)]);
    let harness = TestHarness::new(SchedulerConfig::default(), processor);

    let bad = harness.submit(ids(1..=3), Priority::High);
    let good = harness.submit(ids(10..=12), Priority::Low);

    harness.dispatcher.start().await;
    harness.wait_until_done(&[&bad, &good]).await;

    let failed = harness.service.get_status(&bad).unwrap();
    assert_eq!(failed.status, BatchStatus::Failed);
    assert!(failed.batches[0]
        .error
        .as_deref()
        .unwrap()
        .contains("processor panicked"));
    assert_eq!(harness.status(&good), BatchStatus::Completed);

    let status = harness.dispatcher.status();
    assert!(status.running);
    assert_eq!(status.queued_batches, 0);
    assert_eq!(status.item_pool.active, 0);

    harness.dispatcher.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_submitters_keep_spacing_and_capacity() {
    let interval = Duration::from_secs(2);
    let config = SchedulerConfig {
        batch_size: 4,
        max_concurrent_items: 2,
        parallel_items: true,
        ..Default::default()
    }
    .with_min_dispatch_interval(interval);
    let harness = Arc::new(TestHarness::new(
        config,
        MockItemProcessor::new().with_latency(Duration::from_millis(500)),
    ));
    harness.dispatcher.start().await;

    let priorities = [
        Priority::High,
        Priority::Medium,
        Priority::Low,
        Priority::High,
        Priority::Low,
        Priority::Medium,
    ];
    let submitters: Vec<_> = priorities
        .into_iter()
        .enumerate()
        .map(|(n, priority)| {
            let harness = Arc::clone(&harness);
            tokio::spawn(async move {
                let mut submitted = Vec::new();
                for round in 0..2 {
                    tokio::time::sleep(Duration::from_millis(300 * (n as u64 + 1))).await;
                    let first = n as i64 * 100 + round * 10 + 1;
                    submitted.push(harness.submit(ids(first..=first + 4), priority));
                }
                submitted
            })
        })
        .collect();

    let mut ingestion_ids = Vec::new();
    for submitter in submitters {
        ingestion_ids.extend(submitter.await.unwrap());
    }
    let pending: Vec<&str> = ingestion_ids.iter().map(String::as_str).collect();
    harness.wait_until_done(&pending).await;
    harness.dispatcher.stop().await;

    // Every item ran exactly once, never more than two at a time.
    let recorded = harness.calls.recorded();
    let started: HashMap<ItemId, _> = recorded
        .iter()
        .map(|attempt| (attempt.item.clone(), attempt.started_at))
        .collect();
    assert_eq!(recorded.len(), 60);
    assert_eq!(started.len(), 60);
    assert_eq!(harness.calls.peak_in_flight(), 2);

    // Each batch ended terminal once; its first item starts when it is triggered.
    let mut batch_ids = HashSet::new();
    let mut triggered = Vec::new();
    for id in &ingestion_ids {
        let status = harness.service.get_status(id).unwrap();
        assert_eq!(status.status, BatchStatus::Completed);
        for batch in &status.batches {
            assert_eq!(batch.status, BatchStatus::Completed);
            assert!(batch.triggered_at.is_some());
            assert!(batch.completed_at.is_some());
            assert!(batch_ids.insert(batch.batch_id.clone()));
            triggered.push(batch.ids.iter().map(|item| started[item]).min().unwrap());
        }
    }
    assert_eq!(triggered.len(), 24);

    let status = harness.dispatcher.status();
    assert_eq!(status.batches_dispatched, 24);
    assert_eq!(status.batches_completed, 24);
    assert_eq!(status.batches.completed, 24);

    triggered.sort();
    for pair in triggered.windows(2) {
        assert!(pair[1] - pair[0] >= interval);
    }
}

#[tokio::test(start_paused = true)]
async fn test_restart_during_in_flight_batch_runs_one_loop() {
    let harness = TestHarness::new(
        fixtures::scheduler_config_with_interval(Duration::from_secs(1)),
        MockItemProcessor::new().with_latency(Duration::from_secs(1)),
    );
    let id = harness.submit(ids(1..=9), Priority::Medium);

    harness.dispatcher.start().await;
    while harness.calls.attempts() == 0 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    tokio::join!(harness.dispatcher.stop(), async {
        tokio::task::yield_now().await;
        harness.dispatcher.start().await;
    });
    assert!(harness.dispatcher.is_running());

    harness.wait_until_done(&[&id]).await;
    harness.dispatcher.stop().await;

    assert_eq!(harness.calls.peak_in_flight(), 1);
    assert_eq!(harness.calls.processed(), ids(1..=9));
    assert_eq!(harness.dispatcher.status().batches_dispatched, 3);
}

