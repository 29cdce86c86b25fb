//! Daily scheduler: recompute metrics, then scan for items to reorder

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::config::SchedulerConfig;
use crate::jobs::{Job, JobQueue};

/// Jobs enqueued on every tick, in order
pub fn scheduled_jobs() -> [Job; 2] {
    [
        Job::RecomputeAllMetrics,
        Job::CreateAutomaticProcurement { item: None },
    ]
}

/// Spawn the scheduler task, or nothing when disabled
pub fn spawn_scheduler(queue: JobQueue, config: &SchedulerConfig) -> Option<JoinHandle<()>> {
    if !config.enabled {
        info!("Scheduler disabled");
        return None;
    }

    let period = Duration::from_secs(config.metrics_interval_hours.max(1) * 60 * 60);
    info!("Scheduler running every {} hour(s)", config.metrics_interval_hours.max(1));

    Some(tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            for job in scheduled_jobs() {
                if let Err(e) = queue.enqueue(job).await {
                    error!("Scheduler could not enqueue job: {}", e);
                    return;
                }
            }
        }
    }))
}
