mod cli;
mod commands;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use garagelink_api::DoorAction;

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let daemon = matches!(cli.command, Command::Run);
    init_tracing(cli.global.verbose, daemon);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

/// `RUST_LOG` wins; otherwise `-v` count. The daemon defaults to info.
fn init_tracing(verbosity: u8, daemon: bool) {
    let filter = match verbosity {
        0 if daemon => "info",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let global = &cli.global;
    match cli.command {
        Command::Run => commands::run::handle(global).await,
        Command::Status(args) => commands::door::status(args, global).await,
        Command::Open(args) => commands::door::actuate(DoorAction::Open, args, global).await,
        Command::Close(args) => commands::door::actuate(DoorAction::Close, args, global).await,
        Command::Battery(args) => commands::door::battery(args, global).await,
        Command::Credentials(args) => commands::credentials::handle(args, global),
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "garagelink", &mut std::io::stdout());
            Ok(())
        }
    }
}
