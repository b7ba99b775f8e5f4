//! Periodic compression and truncation of check logs.
//!
//! Each active log is archived as `<id>-<epoch millis>` and then emptied, so
//! later appends continue under the same name. A log whose compression fails
//! keeps its content until a later rotation succeeds.

use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::LogStore;
use crate::clock::Clock;
use crate::sync::KeyedLocks;

/// Outcome of one rotation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RotationReport {
    /// Logs archived and truncated
    pub rotated: Vec<String>,
    /// Logs left untouched or only partly rotated
    pub failed: Vec<String>,
}

/// Compresses and truncates every active log
pub struct LogRotator {
    store: Arc<dyn LogStore>,
    locks: Arc<KeyedLocks>,
    clock: Arc<dyn Clock>,
}

impl LogRotator {
    pub fn new(store: Arc<dyn LogStore>, locks: Arc<KeyedLocks>, clock: Arc<dyn Clock>) -> Self {
        Self { store, locks, clock }
    }

    /// Rotate all active logs
    pub async fn run_cycle(&self) -> RotationReport {
        let logs = match self.store.list(false).await {
            Ok(logs) => logs,
            Err(e) => {
                warn!("Could not list logs to rotate: {}", e);
                return RotationReport::default();
            }
        };

        if logs.is_empty() {
            debug!("No logs to rotate");
            return RotationReport::default();
        }

        let results = join_all(logs.iter().map(|id| self.rotate(id))).await;

        let mut report = RotationReport::default();
        for (id, rotated) in logs.into_iter().zip(results) {
            if rotated {
                report.rotated.push(id);
            } else {
                report.failed.push(id);
            }
        }

        info!(
            "Log rotation completed: {} rotated, {} failed",
            report.rotated.len(),
            report.failed.len()
        );
        report
    }

    /// Archive then truncate one log while holding its lock
    async fn rotate(&self, id: &str) -> bool {
        let _guard = self.locks.acquire(id).await;
        let archive_id = format!("{id}-{}", self.clock.now_millis());

        if let Err(e) = self.store.compress(id, &archive_id).await {
            error!(log_id = %id, "Failed to compress log, keeping it for the next rotation: {}", e);
            return false;
        }

        match self.store.truncate(id).await {
            Ok(()) => {
                debug!(log_id = %id, archive_id = %archive_id, "Rotated log");
                true
            }
            Err(e) => {
                error!(log_id = %id, "Failed to truncate log after archiving: {}", e);
                false
            }
        }
    }
}
