//! Sync command implementation

use std::path::Path;

use colored::Colorize;
use loadout_core::sync::{ApplyReport, CancellationFlag, SyncTree};

use super::{open_workspace, output};
use crate::error::{CliError, Result};

/// Run the sync command
pub fn run_sync(config: &Path, dry_run: bool, json: bool) -> Result<()> {
    let workspace = open_workspace(config)?;
    let disk = workspace.scan()?;
    let synchronizer = workspace.synchronizer();
    let tree = synchronizer.plan(&disk)?;

    if dry_run {
        return print_plan(&tree, json);
    }

    if !tree.needs_apply() {
        if json {
            println!("{}", serde_json::to_string_pretty(&ApplyReport::default())?);
        } else {
            println!("{} Everything is in sync.", "OK".green().bold());
        }
        return Ok(());
    }

    if !json {
        println!("{} Synchronizing {} paths...", "=>".blue().bold(), tree.len());
    }
    let report = synchronizer.apply(&tree, &CancellationFlag::new())?;
    finish(&report, json)
}

pub(crate) fn print_plan(tree: &SyncTree, json: bool) -> Result<()> {
    if json {
        let pending: Vec<_> = tree.pending().collect();
        println!("{}", serde_json::to_string_pretty(&pending)?);
        return Ok(());
    }

    println!("{} Dry run, nothing will be changed", "=>".blue().bold());
    println!();
    output::print_summary(&tree.summary());
    if tree.needs_apply() {
        println!();
        output::print_pending(tree);
    }
    Ok(())
}

/// Print the report and turn path failures into a non-zero exit.
pub(crate) fn finish(report: &ApplyReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        output::print_report(report);
    }

    if !report.failures.is_empty() {
        return Err(CliError::user(format!(
            "{} paths failed to synchronize",
            report.failures.len()
        )));
    }
    if !json {
        println!();
        if report.diagnostics.is_empty() {
            println!("{} Synchronized.", "OK".green().bold());
        } else {
            println!(
                "{} Synchronized with {} warnings.",
                "OK".yellow().bold(),
                report.diagnostics.len()
            );
        }
    }
    Ok(())
}
