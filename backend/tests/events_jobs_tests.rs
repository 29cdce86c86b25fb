//! Background processing tests
//!
//! - Event dispatch to every handler, handler failures isolated
//! - Job retry with backoff up to the attempt limit
//! - Scheduler job order
//! - Reorder handler wired to the event bus

mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use common::{dec, item, services, steady_demand, MemoryStore};
use inventory_procurement_backend::events::{process_events, DomainEvent, EventBus, EventHandler};
use inventory_procurement_backend::jobs::{
    execute_with_retry, run_worker, BatchReport, Job, JobQueue, JobRunner, QueuedJob, RetryPolicy,
    ServiceJobRunner,
};
use inventory_procurement_backend::scheduler::scheduled_jobs;
use inventory_procurement_backend::services::ReorderHandler;
use inventory_procurement_backend::{AppError, AppResult};
use shared::types::{ItemKind, ItemRef};
use tokio_test::{assert_err, assert_ok};
use uuid::Uuid;

struct RecordingHandler {
    seen: Arc<Mutex<Vec<DomainEvent>>>,
}

#[async_trait]
impl EventHandler for RecordingHandler {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn handle_event(&self, event: &DomainEvent) -> AppResult<()> {
        self.seen.lock().unwrap().push(event.clone());
        Ok(())
    }
}

struct FailingHandler;

#[async_trait]
impl EventHandler for FailingHandler {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn handle_event(&self, _event: &DomainEvent) -> AppResult<()> {
        Err(AppError::Internal("handler exploded".to_string()))
    }
}

/// Fails the first `failures` runs
struct FlakyRunner {
    failures: u32,
    calls: AtomicU32,
}

impl FlakyRunner {
    fn new(failures: u32) -> Self {
        Self {
            failures,
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl JobRunner for FlakyRunner {
    async fn run(&self, _job: &Job) -> AppResult<BatchReport> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            return Err(AppError::Internal(format!("attempt {} failed", call)));
        }
        Ok(BatchReport {
            scanned: 1,
            updated: 1,
            ..BatchReport::default()
        })
    }
}

fn queued(job: Job) -> QueuedJob {
    QueuedJob {
        id: Uuid::new_v4(),
        job,
        enqueued_at: Utc::now(),
    }
}

fn policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        backoff: Duration::from_millis(1),
    }
}

// ============================================================================
// Event Tests
// ============================================================================

#[tokio::test]
async fn test_every_handler_sees_every_event() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let handlers: Vec<Arc<dyn EventHandler>> = vec![
        Arc::new(FailingHandler),
        Arc::new(RecordingHandler { seen: seen.clone() }),
    ];
    let (bus, rx) = EventBus::new(8);
    let dispatcher = tokio::spawn(process_events(rx, handlers));

    let item = ItemRef::raw_material(Uuid::new_v4());
    bus.publish(DomainEvent::stock_changed(item, dec("70"), dec("50"))).await;
    bus.publish(DomainEvent::stock_changed(item, dec("50"), dec("20"))).await;
    drop(bus);
    dispatcher.await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert!(matches!(&seen[1], DomainEvent::StockChanged { new_stock, .. } if *new_stock == dec("20")));
}

#[tokio::test]
async fn test_publish_after_dispatcher_stops_is_not_an_error() {
    let (bus, rx) = EventBus::new(1);
    drop(rx);

    assert!(bus.is_closed());
    bus.publish(DomainEvent::stock_changed(ItemRef::product(Uuid::new_v4()), dec("1"), dec("0")))
        .await;
}

#[tokio::test]
async fn test_stock_event_reaches_reorder_trigger() {
    let store = MemoryStore::new();
    store.add_supplier("PT Sumber", 0);
    let flour = store.insert_item(item(ItemKind::RawMaterial, "40"));
    store.set_demand(flour, steady_demand());
    let (_, reorder) = services(store.clone());

    let handlers: Vec<Arc<dyn EventHandler>> = vec![Arc::new(ReorderHandler::new(reorder))];
    let (bus, rx) = EventBus::new(8);
    let dispatcher = tokio::spawn(process_events(rx, handlers));

    bus.publish(DomainEvent::stock_changed(flour, dec("80"), dec("40"))).await;
    drop(bus);
    dispatcher.await.unwrap();

    assert_eq!(store.requests().len(), 1);
}

// ============================================================================
// Job Tests
// ============================================================================

#[tokio::test]
async fn test_job_retries_until_success() {
    let runner = FlakyRunner::new(2);

    let report = assert_ok!(execute_with_retry(&runner, &queued(Job::RecomputeAllMetrics), policy(3)).await);

    assert_eq!(report.updated, 1);
    assert_eq!(runner.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_job_gives_up_after_max_attempts() {
    let runner = FlakyRunner::new(10);

    assert_err!(execute_with_retry(&runner, &queued(Job::RecomputeAllMetrics), policy(3)).await);
    assert_eq!(runner.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_worker_drains_queue() {
    let runner = Arc::new(FlakyRunner::new(0));
    let (queue, rx) = JobQueue::new(4);
    let worker = tokio::spawn(run_worker(rx, runner.clone(), policy(1)));

    queue.enqueue(Job::RecomputeAllMetrics).await.unwrap();
    queue
        .enqueue(Job::CreateAutomaticProcurement { item: None })
        .await
        .unwrap();
    drop(queue);
    worker.await.unwrap();

    assert_eq!(runner.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_enqueue_on_stopped_worker_fails() {
    let (queue, rx) = JobQueue::new(1);
    drop(rx);

    assert_err!(queue.enqueue(Job::RecomputeAllMetrics).await);
}

#[tokio::test]
async fn test_service_runner_creates_requests() {
    let store = MemoryStore::new();
    store.add_supplier("PT Sumber", 0);
    let flour = store.insert_item(item(ItemKind::RawMaterial, "30"));
    store.set_demand(flour, steady_demand());
    let (metrics, reorder) = services(store.clone());
    let runner = ServiceJobRunner::new(metrics, reorder);

    let recompute = runner.run(&Job::RecomputeAllMetrics).await.unwrap();
    let scan = runner
        .run(&Job::CreateAutomaticProcurement { item: Some(flour) })
        .await
        .unwrap();

    assert_eq!(recompute.updated, 1);
    assert_eq!(scan.created, 1);
    assert_eq!(store.requests().len(), 1);
}

#[test]
fn test_scheduler_recomputes_before_scanning() {
    assert_eq!(
        scheduled_jobs(),
        [
            Job::RecomputeAllMetrics,
            Job::CreateAutomaticProcurement { item: None },
        ]
    );
}
