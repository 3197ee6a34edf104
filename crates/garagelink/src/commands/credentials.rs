//! Credential storage.

use std::io::{self, BufRead, Write};

use secrecy::SecretString;

use garagelink_config as config;

use crate::cli::{CredentialsArgs, CredentialsCommand, GlobalOpts};
use crate::error::CliError;

pub fn handle(args: CredentialsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        CredentialsCommand::Set { username } => set(username, global),
    }
}

/// Store the password in the keyring and remember the username in the
/// config file, since the keyring entry is keyed by it.
fn set(username: Option<String>, global: &GlobalOpts) -> Result<(), CliError> {
    let path = super::config_file(global);
    let mut cfg = config::load_config_from(&path)?;

    let username = match username.or_else(|| cfg.username.clone()) {
        Some(u) => u,
        None => prompt_line("Username: ")?,
    };
    let password = rpassword::prompt_password("Password: ").map_err(prompt_err)?;

    if username.trim().is_empty() || password.is_empty() {
        return Err(CliError::Validation {
            field: "credentials".into(),
            reason: "username and password cannot be empty".into(),
        });
    }

    config::store_password(&username, &SecretString::from(password))?;

    if cfg.username.as_deref() != Some(username.as_str()) {
        cfg.username = Some(username.clone());
        config::save_config_to(&cfg, &path)?;
    }

    eprintln!("Password for {username} stored in the system keyring");
    Ok(())
}

fn prompt_line(prompt: &str) -> Result<String, CliError> {
    let mut stderr = io::stderr();
    write!(stderr, "{prompt}").map_err(prompt_err)?;
    stderr.flush().map_err(prompt_err)?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line).map_err(prompt_err)?;
    Ok(line.trim().to_owned())
}

fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Prompt {
        reason: e.to_string(),
    }
}
