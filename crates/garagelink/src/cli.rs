//! Clap derive structures for the `garagelink` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// garagelink -- keep a Genie garage door and a local switch in agreement
#[derive(Debug, Parser)]
#[command(
    name = "garagelink",
    version,
    about = "Bridge a Genie cloud garage door to a local on/off switch",
    long_about = "Polls the Genie cloud for door status and mirrors it onto a local\n\
        on/off switch. Flipping the switch opens or closes the door.\n\n\
        Credentials are read from GENIE_USER / GENIE_PASS, the system\n\
        keyring, or the config file, in that order.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, short = 'c', global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the sync daemon for every configured door
    Run,

    /// Print the current door state
    Status(DoorArgs),

    /// Ask the door to open
    Open(DoorArgs),

    /// Ask the door to close
    Close(DoorArgs),

    /// Print the door sensor battery level
    Battery(DoorArgs),

    /// Manage stored account credentials
    Credentials(CredentialsArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct DoorArgs {
    /// Door name from the config (defaults to the first door)
    #[arg(long, short = 'd')]
    pub door: Option<String>,

    /// Also print the raw response payload
    #[arg(long)]
    pub raw: bool,
}

#[derive(Debug, Args)]
pub struct CredentialsArgs {
    #[command(subcommand)]
    pub command: CredentialsCommand,
}

#[derive(Debug, Subcommand)]
pub enum CredentialsCommand {
    /// Prompt for the account password and store it in the system keyring
    Set {
        /// Account username (defaults to the configured one)
        #[arg(long, short = 'u')]
        username: Option<String>,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: clap_complete::Shell,
}
