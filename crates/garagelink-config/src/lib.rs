//! Configuration for the garagelink bridge.
//!
//! TOML file + `GARAGELINK_*` environment layering, credential resolution
//! (env → keyring → plaintext), and translation into the `garagelink_core`
//! runtime types. Nothing here starts timers or talks to the network.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use garagelink_api::{Credentials, DEFAULT_BASE_URL, TransportConfig};
use garagelink_core::{CoreError, DoorConfig, SyncConfig, UnknownStatePolicy};

/// Keyring service name for stored passwords.
pub const KEYRING_SERVICE: &str = "garagelink";

/// Environment variable holding the account username.
pub const ENV_USER: &str = "GENIE_USER";
/// Environment variable holding the account password.
pub const ENV_PASS: &str = "GENIE_PASS";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured: {missing} not found in environment, keyring, or config")]
    NoCredentials { missing: &'static str },

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl From<ConfigError> for CoreError {
    fn from(err: ConfigError) -> Self {
        CoreError::config(err.to_string())
    }
}

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Genie API root.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,

    #[serde(default = "default_battery_poll_interval_ms")]
    pub battery_poll_interval_ms: u64,

    /// Warn at or below this percentage. Absent disables battery checks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_low_level: Option<u8>,

    #[serde(default)]
    pub unknown_state: UnknownStatePolicy,

    #[serde(default)]
    pub log_api_responses: bool,

    #[serde(default)]
    pub log_door_state_changes: bool,

    /// Per-request HTTP timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Path to an extra CA certificate (PEM).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,

    /// Account username. `GENIE_USER` wins.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Account password (plaintext; prefer `GENIE_PASS` or the keyring).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub doors: Vec<DoorEntry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            poll_interval_ms: default_poll_interval_ms(),
            cooldown_ms: default_cooldown_ms(),
            battery_poll_interval_ms: default_battery_poll_interval_ms(),
            battery_low_level: None,
            unknown_state: UnknownStatePolicy::default(),
            log_api_responses: false,
            log_door_state_changes: false,
            timeout_secs: default_timeout_secs(),
            ca_cert: None,
            username: None,
            password: None,
            doors: Vec::new(),
        }
    }
}

/// One `[[doors]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DoorEntry {
    #[serde(default = "default_door_name")]
    pub name: String,

    #[serde(default)]
    pub device_number: u32,

    #[serde(default = "default_garage_number")]
    pub garage_number: u32,
}

impl Default for DoorEntry {
    fn default() -> Self {
        Self {
            name: default_door_name(),
            device_number: 0,
            garage_number: default_garage_number(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.into()
}
fn default_poll_interval_ms() -> u64 {
    15_000
}
fn default_cooldown_ms() -> u64 {
    10_000
}
fn default_battery_poll_interval_ms() -> u64 {
    3_600_000
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_door_name() -> String {
    "Garage Door".into()
}
fn default_garage_number() -> u32 {
    1
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "garagelink", "garagelink").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("garagelink");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load from `path` + environment. A missing file yields the defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("GARAGELINK_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Translation into runtime types ──────────────────────────────────

impl Config {
    /// Check every value that would otherwise surface as a runtime fault.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.api_url()?;
        if self.poll_interval_ms == 0 {
            return Err(invalid("poll_interval_ms", "must be greater than zero"));
        }
        if self.cooldown_ms == 0 {
            return Err(invalid("cooldown_ms", "must be greater than zero"));
        }
        if self.timeout_secs == 0 {
            return Err(invalid("timeout_secs", "must be greater than zero"));
        }
        if let Some(level) = self.battery_low_level {
            if level > 100 {
                return Err(invalid(
                    "battery_low_level",
                    format!("expected a percentage (0-100), got {level}"),
                ));
            }
            if self.battery_poll_interval_ms == 0 {
                return Err(invalid("battery_poll_interval_ms", "must be greater than zero"));
            }
        }
        for (i, door) in self.doors.iter().enumerate() {
            if door.name.trim().is_empty() {
                return Err(invalid(format!("doors[{i}].name"), "must not be empty"));
            }
            if self.doors[..i].iter().any(|d| d.name == door.name) {
                return Err(invalid(
                    format!("doors[{i}].name"),
                    format!("duplicate door name '{}'", door.name),
                ));
            }
        }
        Ok(())
    }

    pub fn api_url(&self) -> Result<Url, ConfigError> {
        self.base_url
            .parse()
            .map_err(|_| invalid("base_url", format!("invalid URL: {}", self.base_url)))
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            cooldown: Duration::from_millis(self.cooldown_ms),
            battery_poll_interval: Duration::from_millis(self.battery_poll_interval_ms),
            battery_low_level: self.battery_low_level,
            unknown_state: self.unknown_state,
            log_state_changes: self.log_door_state_changes,
        }
    }

    pub fn transport(&self) -> TransportConfig {
        let mut transport = TransportConfig::default().with_timeout(Duration::from_secs(self.timeout_secs));
        if let Some(ref ca) = self.ca_cert {
            transport.tls = garagelink_api::TlsMode::CustomCa(ca.clone());
        }
        transport
    }

    /// Configured doors, or the single default door when none are listed.
    pub fn doors(&self) -> Vec<DoorConfig> {
        if self.doors.is_empty() {
            return vec![DoorConfig::default()];
        }
        self.doors
            .iter()
            .map(|d| DoorConfig::new(d.name.clone(), d.device_number, d.garage_number))
            .collect()
    }

    /// Pick one door by name, or the first configured door.
    pub fn door(&self, name: Option<&str>) -> Result<DoorConfig, ConfigError> {
        let doors = self.doors();
        match name {
            None => doors
                .into_iter()
                .next()
                .ok_or_else(|| invalid("doors", "no door configured")),
            Some(wanted) => doors
                .into_iter()
                .find(|d| d.name.eq_ignore_ascii_case(wanted))
                .ok_or_else(|| invalid("door", format!("no door named '{wanted}'"))),
        }
    }
}

// ── Credential resolution ───────────────────────────────────────────

/// Keyring account under which a user's password is stored.
pub fn keyring_account(username: &str) -> String {
    format!("{username}/password")
}

/// Resolve account credentials from environment, keyring, and config.
pub fn resolve_credentials(cfg: &Config) -> Result<Credentials, ConfigError> {
    resolve_credentials_with(
        cfg,
        std::env::var(ENV_USER).ok(),
        std::env::var(ENV_PASS).ok(),
        keyring_password,
    )
}

/// Credential chain with the lookups injected.
///
/// Username: env → config. Password: env → keyring → config. Blank
/// values count as absent.
pub fn resolve_credentials_with(
    cfg: &Config,
    env_user: Option<String>,
    env_pass: Option<String>,
    keyring_lookup: impl FnOnce(&str) -> Option<String>,
) -> Result<Credentials, ConfigError> {
    let username = non_blank(env_user)
        .or_else(|| non_blank(cfg.username.clone()))
        .ok_or(ConfigError::NoCredentials { missing: "username" })?;

    let password = non_blank(env_pass)
        .or_else(|| non_blank(keyring_lookup(&username)))
        .or_else(|| non_blank(cfg.password.clone()))
        .ok_or(ConfigError::NoCredentials { missing: "password" })?;

    Ok(Credentials::new(username, password))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn keyring_password(username: &str) -> Option<String> {
    keyring::Entry::new(KEYRING_SERVICE, &keyring_account(username))
        .and_then(|entry| entry.get_password())
        .ok()
}

/// Store a password in the system keyring.
pub fn store_password(username: &str, password: &SecretString) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, &keyring_account(username))?;
    entry.set_password(password.expose_secret())?;
    Ok(())
}
