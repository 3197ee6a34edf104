// ── Door domain model ──

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Canonical door state, as reported by the remote service.
///
/// `Unknown` is what an unclassifiable payload becomes; it never forces
/// an actuator write under the default [`UnknownStatePolicy`].
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
#[serde(rename_all = "UPPERCASE")]
pub enum DoorState {
    Open,
    Closed,
    Opening,
    Closing,
    #[default]
    Unknown,
}

impl DoorState {
    /// The on/off value the local actuator should show for this state.
    ///
    /// `None` for [`Unknown`](Self::Unknown).
    pub fn actuator_value(self) -> Option<bool> {
        match self {
            Self::Open | Self::Opening => Some(true),
            Self::Closed | Self::Closing => Some(false),
            Self::Unknown => None,
        }
    }

    pub fn is_known(self) -> bool {
        self != Self::Unknown
    }
}

/// What to do with the actuator when a poll yields [`DoorState::Unknown`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UnknownStatePolicy {
    /// Leave the actuator at its last value.
    #[default]
    Hold,
    /// Treat the door as closed and drive the actuator off.
    ForceClosed,
}

/// A battery check, judged against the configured low threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryReading {
    Low(u8),
    Ok(u8),
    /// The payload carried no usable percentage.
    Unreadable,
}

impl BatteryReading {
    /// `Low` when at or below `threshold`. Without a threshold nothing is low.
    pub fn classify(percent: Option<u8>, threshold: Option<u8>) -> Self {
        match (percent, threshold) {
            (None, _) => Self::Unreadable,
            (Some(level), Some(low)) if level <= low => Self::Low(level),
            (Some(level), _) => Self::Ok(level),
        }
    }
}
