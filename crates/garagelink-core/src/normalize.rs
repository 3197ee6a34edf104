// ── Payload normalization ──
//
// Pure functions that turn loosely-typed remote payloads into the closed
// door-state space and an optional battery percentage. A malformed payload
// is inconclusive, never an error.

use std::str::FromStr;

use serde_json::Value;

use crate::model::DoorState;

/// Status field names, probed in order. The first present (non-null) one wins.
pub const STATUS_FIELDS: [&str; 5] = ["status", "state", "doorState", "door_status", "currentState"];

/// Battery field names, probed in order. The first usable number wins.
pub const BATTERY_FIELDS: [&str; 4] = ["batteryLevel", "battery_level", "battery", "level"];

/// Classify a raw status payload.
///
/// Accepts a bare string or an object carrying one of [`STATUS_FIELDS`].
/// Strings are trimmed and compared case-insensitively against the five
/// canonical tokens.
pub fn normalize(raw: &Value) -> DoorState {
    match raw {
        Value::String(s) => classify(s),
        Value::Object(map) => STATUS_FIELDS
            .iter()
            .find_map(|field| map.get(*field).filter(|v| !v.is_null()))
            .and_then(Value::as_str)
            .map_or(DoorState::Unknown, classify),
        _ => DoorState::Unknown,
    }
}

fn classify(token: &str) -> DoorState {
    DoorState::from_str(token.trim()).unwrap_or(DoorState::Unknown)
}

/// Extract a battery percentage from a raw payload.
///
/// Accepts a bare number (or numeric string) or an object carrying one of
/// [`BATTERY_FIELDS`]. Values outside 0..=100 are not percentages and are
/// skipped.
pub fn battery_percent(raw: &Value) -> Option<u8> {
    match raw {
        Value::Object(map) => BATTERY_FIELDS
            .iter()
            .filter_map(|field| map.get(*field))
            .find_map(percent),
        other => percent(other),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::as_conversions)]
fn percent(value: &Value) -> Option<u8> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok()?,
        _ => return None,
    };
    // Range-checked first, so the cast cannot truncate.
    (n.is_finite() && (0.0..=100.0).contains(&n)).then(|| n.round() as u8)
}
