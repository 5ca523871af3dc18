//! Status command implementation

use std::path::Path;

use colored::Colorize;
use serde::Serialize;

use loadout_core::sync::{SyncNode, TreeSummary};

use super::{open_workspace, output};
use crate::error::Result;

#[derive(Serialize)]
struct StatusOutput<'a> {
    summary: TreeSummary,
    pending: Vec<&'a SyncNode>,
}

/// Run the status command
pub fn run_status(config: &Path, json: bool) -> Result<()> {
    let workspace = open_workspace(config)?;
    let disk = workspace.scan()?;
    let tree = workspace.synchronizer().plan(&disk)?;

    if json {
        let status = StatusOutput {
            summary: tree.summary(),
            pending: tree.pending().collect(),
        };
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("{}", "Loadout Status".bold());
    println!();
    for (location, root) in workspace.locations().locations() {
        println!("{}:   {}", location.to_string().cyan(), root);
    }
    println!();
    output::print_summary(&tree.summary());

    if tree.needs_apply() {
        println!();
        println!("{}:", "Pending".bold());
        output::print_pending(&tree);
        println!();
        println!("Run {} to apply.", "loadout sync".cyan());
    } else {
        println!();
        println!("{} Everything is in sync.", "OK".green().bold());
    }
    Ok(())
}
