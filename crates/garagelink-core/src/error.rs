// ── Core error types ──
//
// The engine never lets a remote or local I/O failure escape a callback;
// these types exist so failures can be logged with context. Only
// `CoreError::Configuration` is allowed to stop the process, and only
// before any timers start.

use thiserror::Error;

/// A failed remote door call, collapsed to the action and a diagnostic.
#[derive(Debug, Clone, Error)]
#[error("remote {action} failed: {message}")]
pub struct RemoteError {
    pub action: &'static str,
    pub message: String,
    /// HTTP status, if the remote answered at all.
    pub status: Option<u16>,
    /// The remote rejected our credentials.
    pub auth: bool,
}

impl RemoteError {
    pub fn new(action: &'static str, message: impl Into<String>) -> Self {
        Self {
            action,
            message: message.into(),
            status: None,
            auth: false,
        }
    }

    pub fn from_api(action: &'static str, err: &garagelink_api::Error) -> Self {
        Self {
            action,
            message: err.to_string(),
            status: err.status(),
            auth: err.is_auth_failure(),
        }
    }
}

/// Failure to read or write the local actuator.
#[derive(Debug, Clone, Error)]
#[error("actuator error: {message}")]
pub struct ActuatorError {
    pub message: String,
}

impl ActuatorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Actuator(#[from] ActuatorError),
}

impl CoreError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}
