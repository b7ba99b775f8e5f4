use std::sync::Arc;
use tracing::{debug, error};

use super::LogStore;
use crate::monitoring::types::{CheckOutcome, CheckRecord, CheckState, LogEntry};
use crate::sync::KeyedLocks;

/// Appends one line per completed probe to the check's own log
pub struct CheckLogger {
    store: Arc<dyn LogStore>,
    locks: Arc<KeyedLocks>,
}

impl CheckLogger {
    /// `locks` must be shared with the rotator so appends never land mid-rotation
    pub fn new(store: Arc<dyn LogStore>, locks: Arc<KeyedLocks>) -> Self {
        Self { store, locks }
    }

    /// Record a probe. Failures are logged and reported as `false`.
    pub async fn log(
        &self,
        check: &CheckRecord,
        outcome: &CheckOutcome,
        state: CheckState,
        alert: bool,
        time: i64,
    ) -> bool {
        let entry =
            LogEntry { check: check.clone(), outcome: outcome.clone(), state, alert, time };

        let line = match entry.to_line() {
            Ok(line) => line,
            Err(e) => {
                error!(check_id = %check.id, "Failed to serialize log entry: {}", e);
                return false;
            }
        };

        let _guard = self.locks.acquire(&check.id).await;
        match self.store.append(&check.id, &line).await {
            Ok(()) => {
                debug!(check_id = %check.id, "Logged check outcome");
                true
            }
            Err(e) => {
                error!(check_id = %check.id, "Failed to append to check log: {}", e);
                false
            }
        }
    }
}
