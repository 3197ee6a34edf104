//! Terminal rendering for one-shot commands.

use std::io::{self, IsTerminal};

use owo_colors::OwoColorize;

use garagelink_core::{BatteryReading, DoorState};

use crate::cli::ColorMode;

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
    }
}

pub fn door_state(state: DoorState, color: bool) -> String {
    let label = state.to_string();
    if !color {
        return label;
    }
    match state {
        DoorState::Open => label.green().bold().to_string(),
        DoorState::Closed => label.cyan().bold().to_string(),
        DoorState::Opening | DoorState::Closing => label.yellow().to_string(),
        DoorState::Unknown => label.red().to_string(),
    }
}

pub fn battery(reading: BatteryReading, color: bool) -> String {
    let label = match reading {
        BatteryReading::Low(level) => format!("{level}% (low)"),
        BatteryReading::Ok(level) => format!("{level}%"),
        BatteryReading::Unreadable => "unreadable".to_owned(),
    };
    if !color {
        return label;
    }
    match reading {
        BatteryReading::Low(_) => label.red().bold().to_string(),
        BatteryReading::Ok(_) => label.green().to_string(),
        BatteryReading::Unreadable => label.dimmed().to_string(),
    }
}

/// Pretty JSON for `--raw`.
pub fn raw(payload: &serde_json::Value) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(payload)
}
