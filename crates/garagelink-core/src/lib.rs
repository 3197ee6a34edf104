//! Door-state synchronization between the Genie cloud and a local on/off
//! actuator.
//!
//! - **[`SyncEngine`]**: Per-door reconciliation loop:
//!   [`spawn()`](SyncEngine::spawn) performs one immediate status poll, then
//!   runs the poll timer, translates controller writes into open/close
//!   commands, and re-polls after a cooldown. An optional battery timer runs
//!   alongside. [`EngineHandle`] exposes state snapshots and shutdown.
//!
//! - **[`normalize()`]** / **[`battery_percent()`]**: Pure classifiers for
//!   weakly-typed remote payloads.
//!
//! - **[`RemoteDoor`]**: The four remote verbs. [`GenieDoor`] binds a
//!   `garagelink_api::GenieClient` to one account and one door.
//!
//! - **[`Actuator`]**: The local binary device. [`LocalSwitch`] is the
//!   in-process implementation that host protocol stacks drive.

pub mod actuator;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod normalize;
pub mod remote;

// ── Primary re-exports ──────────────────────────────────────────────
pub use actuator::{Actuator, ExternalWrites, LocalSwitch};
pub use config::{DoorConfig, SyncConfig};
pub use engine::{EngineHandle, SyncEngine, SyncPhase, SyncSnapshot};
pub use error::{ActuatorError, CoreError, RemoteError};
pub use model::{BatteryReading, DoorState, UnknownStatePolicy};
pub use normalize::{battery_percent, normalize};
pub use remote::{GenieDoor, RemoteDoor};

pub use garagelink_api::{Credentials, DoorAddress};
