use std::sync::Arc;
use tracing::{error, info};

use super::Messenger;
use crate::monitoring::types::CheckRecord;

/// Tells a check's owner that its state changed
pub struct AlertDispatcher {
    messenger: Arc<dyn Messenger>,
}

impl AlertDispatcher {
    pub fn new(messenger: Arc<dyn Messenger>) -> Self {
        Self { messenger }
    }

    /// Human-readable alert for a check's current state
    pub fn message(check: &CheckRecord) -> String {
        format!(
            "Alert: Your check for {} {} is currently {}",
            check.method.as_upper(),
            check.target(),
            check.state
        )
    }

    /// Best effort: failures are logged, never retried
    pub async fn dispatch(&self, check: &CheckRecord) -> bool {
        match self.messenger.send(&check.user_phone, &Self::message(check)).await {
            Ok(()) => {
                info!(check_id = %check.id, state = %check.state, "User alerted to a status change");
                true
            }
            Err(e) => {
                error!(check_id = %check.id, "Could not send status change alert: {}", e);
                false
            }
        }
    }
}
