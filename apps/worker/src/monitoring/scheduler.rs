use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use super::pipeline::CheckPipeline;
use crate::database::{CHECKS, CheckStore};
use crate::error::StorageError;
use crate::sync::KeyedLocks;

/// Counts from one pass over the stored checks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Ids returned by the store
    pub listed: usize,
    /// Pipelines spawned
    pub launched: usize,
    /// Ids whose previous pipeline was still running
    pub skipped_in_flight: usize,
    /// Ids whose record could not be read
    pub read_failures: usize,
}

/// Fans out one pipeline per stored check
pub struct MonitoringScheduler {
    store: Arc<dyn CheckStore>,
    pipeline: Arc<CheckPipeline>,
    in_flight: KeyedLocks,
    limiter: Arc<Semaphore>,
    tracker: TaskTracker,
}

impl MonitoringScheduler {
    /// Create a scheduler running at most `max_concurrent_probes` pipelines at once
    pub fn new(
        store: Arc<dyn CheckStore>,
        pipeline: Arc<CheckPipeline>,
        max_concurrent_probes: usize,
    ) -> Self {
        Self {
            store,
            pipeline,
            in_flight: KeyedLocks::new(),
            limiter: Arc::new(Semaphore::new(max_concurrent_probes.max(1))),
            tracker: TaskTracker::new(),
        }
    }

    /// List every check and launch its pipeline without waiting for it.
    ///
    /// A check whose pipeline from an earlier cycle is still running is skipped.
    pub async fn run_cycle(&self) -> Result<CycleReport, StorageError> {
        let ids = self.store.list(CHECKS).await?;
        let mut report = CycleReport { listed: ids.len(), ..Default::default() };

        if ids.is_empty() {
            info!("No checks to process");
            return Ok(report);
        }

        let mut claimed = Vec::with_capacity(ids.len());
        for id in ids {
            match self.in_flight.try_acquire(&id) {
                Some(guard) => claimed.push((id, guard)),
                None => {
                    warn!(check_id = %id, "Previous probe still running, skipping this cycle");
                    report.skipped_in_flight += 1;
                }
            }
        }

        let reads = join_all(claimed.iter().map(|(id, _)| self.store.read(CHECKS, id))).await;

        for ((id, guard), read) in claimed.into_iter().zip(reads) {
            let raw = match read {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(check_id = %id, "Error reading check data: {}", e);
                    report.read_failures += 1;
                    continue;
                }
            };

            let pipeline = Arc::clone(&self.pipeline);
            let limiter = Arc::clone(&self.limiter);
            self.tracker.spawn(async move {
                let _in_flight = guard;
                let Ok(_permit) = limiter.acquire_owned().await else {
                    return;
                };

                match pipeline.run(&raw).await {
                    Ok(result) => debug!(check_id = %id, state = %result.state, "Check processed"),
                    Err(e) => warn!(check_id = %id, "Skipping improperly formatted check: {}", e),
                }
            });
            report.launched += 1;
        }

        info!(
            "Check cycle dispatched: {} listed, {} launched, {} still running, {} unreadable",
            report.listed, report.launched, report.skipped_in_flight, report.read_failures
        );
        Ok(report)
    }

    /// Wait until every pipeline spawned so far has finished
    pub async fn wait_idle(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}
