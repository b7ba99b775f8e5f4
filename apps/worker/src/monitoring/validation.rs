//! Sanitization of stored check records.
//!
//! Every field is coerced on its own. A record is accepted only when all
//! required fields survive; `state` and `last_check` fall back to defaults.

use serde_json::{Map, Value};

use super::types::{CheckRecord, CheckState, Method, Protocol};
use crate::error::ValidationError;

const ID_LENGTH: usize = 20;
const MIN_PHONE_LENGTH: usize = 8;
const MIN_TIMEOUT_SECONDS: u8 = 1;
const MAX_TIMEOUT_SECONDS: u8 = 5;

/// Turn a raw stored record into a trusted check definition
pub fn validate_check(raw: &Value) -> Result<CheckRecord, ValidationError> {
    let empty = Map::new();
    let fields = raw.as_object().unwrap_or(&empty);

    let id = coerce_id(fields.get("id"));
    let user_phone = coerce_phone(fields.get("user_phone"));
    let protocol = coerce_protocol(fields.get("protocol"));
    let url = coerce_url(fields.get("url"));
    let method = coerce_method(fields.get("method"));
    let success_codes = coerce_success_codes(fields.get("success_codes"));
    let timeout_seconds = coerce_timeout(fields.get("timeout_seconds"));

    let state = coerce_state(fields.get("state"));
    let last_check = coerce_last_check(fields.get("last_check"));

    match (id, user_phone, protocol, url, method, success_codes, timeout_seconds) {
        (
            Some(id),
            Some(user_phone),
            Some(protocol),
            Some(url),
            Some(method),
            Some(success_codes),
            Some(timeout_seconds),
        ) => Ok(CheckRecord {
            id,
            user_phone,
            protocol,
            url,
            method,
            success_codes,
            timeout_seconds,
            state,
            last_check,
        }),
        (id, user_phone, protocol, url, method, success_codes, timeout_seconds) => {
            let checks = [
                ("id", id.is_some()),
                ("user_phone", user_phone.is_some()),
                ("protocol", protocol.is_some()),
                ("url", url.is_some()),
                ("method", method.is_some()),
                ("success_codes", success_codes.is_some()),
                ("timeout_seconds", timeout_seconds.is_some()),
            ];
            let fields = checks
                .into_iter()
                .filter_map(|(name, valid)| (!valid).then_some(name))
                .collect();
            Err(ValidationError::Rejected { fields })
        }
    }
}

fn coerce_id(value: Option<&Value>) -> Option<String> {
    let id = value?.as_str()?;
    (id.trim().chars().count() == ID_LENGTH).then(|| id.to_string())
}

fn coerce_phone(value: Option<&Value>) -> Option<String> {
    let phone = value?.as_str()?;
    (phone.trim().chars().count() >= MIN_PHONE_LENGTH).then(|| phone.to_string())
}

fn coerce_protocol(value: Option<&Value>) -> Option<Protocol> {
    Protocol::parse(value?.as_str()?)
}

fn coerce_url(value: Option<&Value>) -> Option<String> {
    let url = value?.as_str()?.trim();
    (!url.is_empty()).then(|| url.to_string())
}

fn coerce_method(value: Option<&Value>) -> Option<Method> {
    Method::parse(value?.as_str()?)
}

fn coerce_success_codes(value: Option<&Value>) -> Option<Vec<u16>> {
    let codes = value?.as_array()?;
    if codes.is_empty() {
        return None;
    }
    codes.iter().map(as_whole_number).map(|code| u16::try_from(code?).ok()).collect()
}

fn coerce_timeout(value: Option<&Value>) -> Option<u8> {
    let seconds = u8::try_from(as_whole_number(value?)?).ok()?;
    (MIN_TIMEOUT_SECONDS..=MAX_TIMEOUT_SECONDS).contains(&seconds).then_some(seconds)
}

fn coerce_state(value: Option<&Value>) -> CheckState {
    match value.and_then(Value::as_str) {
        Some("up") => CheckState::Up,
        _ => CheckState::Down,
    }
}

fn coerce_last_check(value: Option<&Value>) -> Option<i64> {
    let time = value?.as_f64()?;
    (time > 0.0).then_some(time as i64)
}

/// Integral JSON numbers, including floats such as `3.0`
fn as_whole_number(value: &Value) -> Option<i64> {
    if let Some(number) = value.as_i64() {
        return Some(number);
    }
    let number = value.as_f64()?;
    (number.fract() == 0.0 && number.is_finite()).then_some(number as i64)
}
