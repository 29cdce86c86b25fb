//! Background task queue
//!
//! Jobs are executed at least once by a single worker. A failing job is
//! retried with linear backoff up to `max_attempts`, then logged as failed.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::types::ItemRef;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::JobsConfig;
use crate::error::{AppError, AppResult};
use crate::services::metrics::MetricsService;
use crate::services::reorder::ReorderService;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Job {
    /// Check one item, or every active item when `item` is `None`
    CreateAutomaticProcurement { item: Option<ItemRef> },
    RecomputeAllMetrics,
}

impl Job {
    pub fn name(&self) -> &'static str {
        match self {
            Job::CreateAutomaticProcurement { .. } => "create_automatic_procurement",
            Job::RecomputeAllMetrics => "recompute_all_metrics",
        }
    }
}

/// Counts from a batch run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub scanned: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Queued job envelope
#[derive(Debug, Clone)]
pub struct QueuedJob {
    pub id: Uuid,
    pub job: Job,
    pub enqueued_at: DateTime<Utc>,
}

#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run(&self, job: &Job) -> AppResult<BatchReport>;
}

#[derive(Debug, Clone)]
pub struct JobQueue {
    sender: mpsc::Sender<QueuedJob>,
}

impl JobQueue {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<QueuedJob>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// True once the receiving side has stopped
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    pub async fn enqueue(&self, job: Job) -> AppResult<Uuid> {
        let queued = QueuedJob {
            id: Uuid::new_v4(),
            job,
            enqueued_at: Utc::now(),
        };
        let id = queued.id;
        let name = queued.job.name();

        self.sender
            .send(queued)
            .await
            .map_err(|_| AppError::Internal(format!("Job queue closed, {} dropped", name)))?;

        info!("Enqueued job {} ({})", name, id);
        Ok(id)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl From<&JobsConfig> for RetryPolicy {
    fn from(config: &JobsConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }
}

/// Run a job until it succeeds or attempts run out
pub async fn execute_with_retry(
    runner: &dyn JobRunner,
    queued: &QueuedJob,
    policy: RetryPolicy,
) -> AppResult<BatchReport> {
    let name = queued.job.name();
    let mut attempt = 1;

    loop {
        info!("Starting job {} ({}) attempt {}", name, queued.id, attempt);

        match runner.run(&queued.job).await {
            Ok(report) => {
                info!("Completed job {} ({}): {:?}", name, queued.id, report);
                return Ok(report);
            }
            Err(e) if attempt < policy.max_attempts => {
                warn!(
                    "Job {} ({}) attempt {} failed, retrying: {}",
                    name, queued.id, attempt, e
                );
                tokio::time::sleep(policy.backoff * attempt).await;
                attempt += 1;
            }
            Err(e) => {
                error!(
                    "Job {} ({}) failed after {} attempt(s): {}",
                    name, queued.id, attempt, e
                );
                return Err(e);
            }
        }
    }
}

/// Worker loop, returns when every `JobQueue` clone is dropped
pub async fn run_worker(mut rx: mpsc::Receiver<QueuedJob>, runner: Arc<dyn JobRunner>, policy: RetryPolicy) {
    info!("Job worker started");

    while let Some(queued) = rx.recv().await {
        // Failure is already logged; the worker moves on
        let _ = execute_with_retry(runner.as_ref(), &queued, policy).await;
    }

    info!("Job worker stopped");
}

/// Runs jobs against the metrics and reorder services
#[derive(Clone)]
pub struct ServiceJobRunner {
    metrics: MetricsService,
    reorder: ReorderService,
}

impl ServiceJobRunner {
    pub fn new(metrics: MetricsService, reorder: ReorderService) -> Self {
        Self { metrics, reorder }
    }
}

#[async_trait]
impl JobRunner for ServiceJobRunner {
    async fn run(&self, job: &Job) -> AppResult<BatchReport> {
        match job {
            Job::CreateAutomaticProcurement { item } => self.reorder.run(*item).await,
            Job::RecomputeAllMetrics => self.metrics.update_all_metrics().await,
        }
    }
}
