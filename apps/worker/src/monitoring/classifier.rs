use super::types::{CheckOutcome, CheckRecord, CheckState};

/// State derived from a probe, and whether the owner should hear about it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub state: CheckState,
    pub alert_warranted: bool,
}

/// Classify a probe outcome against the check's prior state.
///
/// Any error is decisive for `Down`, whatever the response code says. A check
/// that has never been probed never alerts.
pub fn classify(check: &CheckRecord, outcome: &CheckOutcome) -> Classification {
    let healthy = outcome.error.is_none()
        && outcome.response_code.is_some_and(|code| check.success_codes.contains(&code));

    let state = if healthy { CheckState::Up } else { CheckState::Down };
    let alert_warranted = check.last_check.is_some() && check.state != state;

    Classification { state, alert_warranted }
}
