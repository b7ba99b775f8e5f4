use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, warn};

use super::checker::Prober;
use super::classifier::{Classification, classify};
use super::types::{CheckOutcome, CheckState};
use super::validation::validate_check;
use crate::alerts::AlertDispatcher;
use crate::clock::Clock;
use crate::database::StatePersister;
use crate::error::ValidationError;
use crate::logs::CheckLogger;

/// What happened to one check during a cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub check_id: String,
    pub outcome: CheckOutcome,
    pub state: CheckState,
    pub alert_warranted: bool,
    pub persisted: bool,
    pub alert_sent: bool,
    pub logged: bool,
}

/// Validate, probe, classify, log, persist and alert for a single record
pub struct CheckPipeline {
    prober: Arc<dyn Prober>,
    persister: StatePersister,
    dispatcher: AlertDispatcher,
    logger: CheckLogger,
    clock: Arc<dyn Clock>,
}

impl CheckPipeline {
    pub fn new(
        prober: Arc<dyn Prober>,
        persister: StatePersister,
        dispatcher: AlertDispatcher,
        logger: CheckLogger,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { prober, persister, dispatcher, logger, clock }
    }

    /// Run the pipeline for a raw stored record.
    ///
    /// Malformed records stop before the probe. Alerts go out only after the
    /// new state has been persisted.
    pub async fn run(&self, raw: &Value) -> Result<PipelineReport, ValidationError> {
        let check = validate_check(raw)?;

        let outcome = self.prober.probe(&check).await;
        let Classification { state, alert_warranted } = classify(&check, &outcome);
        let time = self.clock.now_millis();

        debug!(
            check_id = %check.id,
            response_code = ?outcome.response_code,
            error = ?outcome.error,
            state = %state,
            alert = alert_warranted,
            "Probe completed"
        );

        let logged = self.logger.log(&check, &outcome, state, alert_warranted, time).await;

        let updated = check.with_result(state, time);
        let persisted = match self.persister.persist(raw, &updated).await {
            Ok(()) => true,
            Err(e) => {
                error!(check_id = %check.id, "Failed to save check state: {}", e);
                false
            }
        };

        let alert_sent = match (alert_warranted, persisted) {
            (true, true) => self.dispatcher.dispatch(&updated).await,
            (true, false) => {
                warn!(check_id = %check.id, "State change not persisted, alert withheld");
                false
            }
            (false, _) => {
                debug!(check_id = %check.id, "Check state unchanged, no alert needed");
                false
            }
        };

        Ok(PipelineReport {
            check_id: updated.id,
            outcome,
            state,
            alert_warranted,
            persisted,
            alert_sent,
            logged,
        })
    }
}
