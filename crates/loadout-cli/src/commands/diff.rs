//! Diff command implementation

use std::path::Path;

use colored::Colorize;
use loadout_core::sync::{ChangeKind, DiffEntry};

use super::open_workspace;
use crate::error::Result;

/// Run the diff command
pub fn run_diff(config: &Path, json: bool, all: bool) -> Result<()> {
    let workspace = open_workspace(config)?;
    let disk = workspace.scan()?;
    let entries: Vec<DiffEntry> = workspace
        .synchronizer()
        .diff(&disk)?
        .into_iter()
        .filter(|entry| all || entry.change != ChangeKind::None)
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("{} No changes to disk.", "OK".green().bold());
        return Ok(());
    }

    for entry in &entries {
        let line = match entry.change {
            ChangeKind::Added => format!("+ {}", entry.path).green(),
            ChangeKind::Modified => format!("~ {}", entry.path).yellow(),
            ChangeKind::Removed => format!("- {}", entry.path).red(),
            ChangeKind::None => format!("  {}", entry.path).dimmed(),
        };
        println!("{line}");
    }
    Ok(())
}
