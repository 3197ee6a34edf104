// ── Per-door sync context ──
//
// Owned by the engine loop and passed by `&mut` into every handler. Nothing
// else holds it, so it needs no locking.

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::Display;

use crate::model::DoorState;

/// Where the door's sync cycle currently is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SyncPhase {
    /// No remote operation in flight.
    #[default]
    Idle,
    /// A status poll is in flight.
    Polling,
    /// An open/close command is in flight.
    Actuating,
    /// Waiting for the door to move before trusting the next poll.
    Cooldown,
}

/// Read-only view of a [`SyncContext`], published after every event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncSnapshot {
    pub phase: SyncPhase,
    pub last_state: DoorState,
    pub generation: u64,
    pub poll_in_flight: bool,
    pub last_poll: Option<DateTime<Utc>>,
    pub last_actuation: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub(crate) struct SyncContext {
    pub phase: SyncPhase,
    pub last_state: DoorState,
    /// Bumped on every external write. Delayed work captures it and is
    /// dropped if it has moved on.
    pub generation: u64,
    pub last_poll: Option<DateTime<Utc>>,
    pub last_actuation: Option<DateTime<Utc>>,
    /// Generation captured when the in-flight poll started.
    pub poll_in_flight: Option<u64>,
    pub actuation_in_flight: bool,
    /// Latest target written while a command was already in flight.
    pub queued_target: Option<bool>,
    /// A cooldown expired while a stale poll was still out.
    pub resync_pending: bool,
    pub battery_in_flight: bool,
}

impl SyncContext {
    pub fn bump_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// Poll results from before the latest actuation describe a door that
    /// has since been told to move.
    pub fn is_stale(&self, generation: u64) -> bool {
        generation < self.generation
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        SyncSnapshot {
            phase: self.phase,
            last_state: self.last_state,
            generation: self.generation,
            poll_in_flight: self.poll_in_flight.is_some(),
            last_poll: self.last_poll,
            last_actuation: self.last_actuation,
        }
    }
}
