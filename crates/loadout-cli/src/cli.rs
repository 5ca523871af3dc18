//! CLI argument parsing using clap derive

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Loadout synchronizer - keep game directories in line with a mod loadout
#[derive(Parser, Debug)]
#[command(name = "loadout")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the synchronizer configuration
    #[arg(short, long, global = true, env = "LOADOUT_CONFIG", default_value = "sync.toml")]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The command to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Write a starter configuration
    ///
    /// Examples:
    ///   loadout init --game "C:/Games/Skyrim"
    ///   loadout init --game ./game --io-concurrency 8
    Init {
        /// Root directory of the game installation
        #[arg(long)]
        game: PathBuf,

        /// Number of paths applied concurrently
        #[arg(long)]
        io_concurrency: Option<usize>,

        /// Overwrite an existing configuration
        #[arg(long)]
        force: bool,
    },

    /// Show what a sync would do, grouped by outcome
    Status {
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Preview per-file changes to disk
    Diff {
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,

        /// Include files that would not change
        #[arg(long)]
        all: bool,
    },

    /// Reconcile disk, snapshot and loadout
    Sync {
        /// Preview changes without applying them
        #[arg(long)]
        dry_run: bool,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Force disk to match a baseline manifest, backing up what it replaces
    Reset {
        /// Loadout manifest describing the baseline
        #[arg(long)]
        baseline: PathBuf,

        /// Preview changes without applying them
        #[arg(long)]
        dry_run: bool,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Print the signature to action table
    Rules {
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },
}
