// ── Runtime sync configuration ──
//
// These types describe *what* to sync and *how often*. They never touch
// disk; `garagelink-config` builds them and hands them in.

use std::time::Duration;

use garagelink_api::DoorAddress;

use crate::error::CoreError;
use crate::model::UnknownStatePolicy;

/// Identity of a single door. Immutable for the life of the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoorConfig {
    /// Logical name, used in logs and as the local device label.
    pub name: String,
    /// Remote device index and garage number.
    pub address: DoorAddress,
}

impl DoorConfig {
    pub fn new(name: impl Into<String>, device_number: u32, garage_number: u32) -> Self {
        Self {
            name: name.into(),
            address: DoorAddress {
                device_number,
                garage_number,
            },
        }
    }
}

impl Default for DoorConfig {
    fn default() -> Self {
        Self {
            name: "Garage Door".into(),
            address: DoorAddress::default(),
        }
    }
}

/// Timing and policy knobs for one [`SyncEngine`](crate::SyncEngine).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Period of the status poll timer.
    pub poll_interval: Duration,
    /// Delay after an open/close command before the confirming poll.
    pub cooldown: Duration,
    /// Period of the battery check timer.
    pub battery_poll_interval: Duration,
    /// Warn when the battery is at or below this percentage.
    /// `None` disables battery monitoring entirely.
    pub battery_low_level: Option<u8>,
    pub unknown_state: UnknownStatePolicy,
    /// Log every poll's raw and mapped state at info instead of debug.
    pub log_state_changes: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(15_000),
            cooldown: Duration::from_millis(10_000),
            battery_poll_interval: Duration::from_millis(3_600_000),
            battery_low_level: None,
            unknown_state: UnknownStatePolicy::Hold,
            log_state_changes: false,
        }
    }
}

impl SyncConfig {
    /// Reject values that would spin a timer or never fire a warning.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.poll_interval.is_zero() {
            return Err(CoreError::config("poll interval must be greater than zero"));
        }
        if self.cooldown.is_zero() {
            return Err(CoreError::config("cooldown must be greater than zero"));
        }
        if self.battery_low_level.is_some() && self.battery_poll_interval.is_zero() {
            return Err(CoreError::config(
                "battery poll interval must be greater than zero",
            ));
        }
        if let Some(level) = self.battery_low_level {
            if level > 100 {
                return Err(CoreError::config(format!(
                    "battery low level must be a percentage, got {level}"
                )));
            }
        }
        Ok(())
    }
}
