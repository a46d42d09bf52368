//! Binary entrypoint for the inputswitch menu bar agent and CLI.
use std::{path::PathBuf, process};

use clap::Parser;
use config::{PolicyStore, resolve_config_path};
use tracing::debug;

/// Menu bar agent loop.
mod agent;
/// Policy editing subcommands.
mod cli;
mod icons;
/// Status item and menu.
mod tray;

#[derive(Parser, Debug)]
#[command(
    name = "inputswitch",
    about = "Switch keyboard input sources per application",
    version
)]
/// Command-line interface for the `inputswitch` binary.
struct Cli {
    /// Subcommand; without one the menu bar agent runs.
    #[command(subcommand)]
    command: Option<cli::Command>,

    /// Logging controls
    #[command(flatten)]
    log: logging::LogArgs,

    /// Optional path to the policy file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Parse arguments, then run a subcommand or the agent.
fn main() {
    let cli = Cli::parse();
    logging::init(&cli.log);

    let path = resolve_config_path(cli.config.as_deref());
    debug!("policy file: {}", path.display());
    let store = match PolicyStore::open(&path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{}", e.pretty());
            process::exit(1);
        }
    };

    match cli.command {
        Some(cmd) => match cli::run(&cmd, &store) {
            Ok(out) => print!("{out}"),
            Err(e) => {
                eprintln!("{}", e.pretty());
                process::exit(1);
            }
        },
        None => agent::run(store),
    }
}
