//! Command handlers and the config/client plumbing they share.

pub mod credentials;
pub mod door;
pub mod run;

use std::path::PathBuf;

use garagelink_api::{Credentials, GenieClient};
use garagelink_config::{self as config, Config};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// `--config` if given, otherwise the platform default.
pub fn config_file(global: &GlobalOpts) -> PathBuf {
    global.config.clone().unwrap_or_else(config::config_path)
}

/// Load and validate the config.
pub fn load_config(global: &GlobalOpts) -> Result<Config, CliError> {
    let path = config_file(global);
    tracing::debug!(path = %path.display(), "loading config");
    let cfg = config::load_config_from(&path)?;
    cfg.validate()?;
    Ok(cfg)
}

/// Resolve credentials and build an API client from a loaded config.
pub fn connect(cfg: &Config) -> Result<(GenieClient, Credentials), CliError> {
    let credentials = config::resolve_credentials(cfg)?;
    let client = GenieClient::new(cfg.api_url()?, &cfg.transport())?
        .log_responses(cfg.log_api_responses);
    Ok((client, credentials))
}
