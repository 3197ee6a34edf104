//! CLI error types with miette diagnostics.
//!
//! Maps API, core, and config errors into user-facing errors with
//! actionable help text and a stable exit code.

use miette::Diagnostic;
use thiserror::Error;

use garagelink_config::ConfigError;
use garagelink_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const CONFIG: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not reach the Genie API at {url}")]
    #[diagnostic(
        code(garagelink::connection_failed),
        help(
            "Check network connectivity and the configured base_url.\n\
             URL: {url}"
        )
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("TLS setup failed: {message}")]
    #[diagnostic(
        code(garagelink::tls_error),
        help("Check the ca_cert path in your config file.")
    )]
    TlsError { message: String },

    // ── Authentication ───────────────────────────────────────────────

    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(garagelink::auth_failed),
        help(
            "Verify your Genie account username and password.\n\
             Run: garagelink credentials set"
        )
    )]
    AuthFailed { message: String },

    #[error("No {missing} configured")]
    #[diagnostic(
        code(garagelink::no_credentials),
        help(
            "Set GENIE_USER and GENIE_PASS, or store the password with:\n\
             garagelink credentials set --username <USER>"
        )
    )]
    NoCredentials { missing: &'static str },

    // ── API ──────────────────────────────────────────────────────────

    #[error("Door {action} failed: {message}")]
    #[diagnostic(code(garagelink::api_error))]
    ApiError { action: String, message: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(garagelink::validation))]
    Validation { field: String, reason: String },

    #[error(transparent)]
    #[diagnostic(
        code(garagelink::config),
        help("Check the config file syntax and GARAGELINK_* environment variables.")
    )]
    Config(Box<ConfigError>),

    #[error("Keyring access failed: {message}")]
    #[diagnostic(
        code(garagelink::keyring),
        help("Use GENIE_PASS or a plaintext password in the config file instead.")
    )]
    Keyring { message: String },

    // ── IO / Serialization ────────────────────────────────────────────

    #[error("Prompt failed: {reason}")]
    #[diagnostic(code(garagelink::prompt))]
    Prompt { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(garagelink::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::TlsError { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::Validation { .. } | Self::Config(_) => exit_code::CONFIG,
            _ => exit_code::GENERAL,
        }
    }
}

// ── Upstream error mapping ───────────────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { missing } => CliError::NoCredentials { missing },
            ConfigError::Keyring(e) => CliError::Keyring {
                message: e.to_string(),
            },
            other => CliError::Config(Box::new(other)),
        }
    }
}

impl From<garagelink_api::Error> for CliError {
    fn from(err: garagelink_api::Error) -> Self {
        use garagelink_api::Error;

        match err {
            Error::Authentication { message } => CliError::AuthFailed { message },
            Error::Transport(e) => CliError::ConnectionFailed {
                url: e
                    .url()
                    .map_or_else(|| "(unknown)".into(), ToString::to_string),
                source: Box::new(e),
            },
            Error::InvalidUrl(e) => CliError::Validation {
                field: "base_url".into(),
                reason: e.to_string(),
            },
            Error::Tls(message) => CliError::TlsError { message },
            Error::Api {
                action,
                status,
                message,
            } => CliError::ApiError {
                action: action.into(),
                message: format!("HTTP {status}: {message}"),
            },
            Error::Deserialization { message, body: _ } => CliError::ApiError {
                action: "response".into(),
                message,
            },
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Configuration { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },
            CoreError::Remote(e) if e.auth => CliError::AuthFailed { message: e.message },
            CoreError::Remote(e) => CliError::ApiError {
                action: e.action.into(),
                message: e.message,
            },
            CoreError::Actuator(e) => CliError::ApiError {
                action: "actuator".into(),
                message: e.message,
            },
        }
    }
}
