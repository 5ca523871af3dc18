//! Loadout synchronizer CLI
//!
//! Drives reconciliation passes over the game directories named in a
//! configuration file.

mod cli;
mod commands;
mod error;
mod logging;

use clap::Parser;
use colored::Colorize;

use cli::{Cli, Commands};
use error::Result;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose)?;

    match cli.command {
        Some(cmd) => execute_command(&cli.config, cmd),
        None => {
            println!("{} Loadout synchronizer", "loadout".green().bold());
            println!();
            println!("Run {} for available commands.", "loadout --help".cyan());
            Ok(())
        }
    }
}

fn execute_command(config: &std::path::Path, cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Init {
            game,
            io_concurrency,
            force,
        } => commands::run_init(config, &game, io_concurrency, force),
        Commands::Status { json } => commands::run_status(config, json),
        Commands::Diff { json, all } => commands::run_diff(config, json, all),
        Commands::Sync { dry_run, json } => commands::run_sync(config, dry_run, json),
        Commands::Reset {
            baseline,
            dry_run,
            json,
        } => commands::run_reset(config, &baseline, dry_run, json),
        Commands::Rules { json } => commands::run_rules(json),
    }
}
