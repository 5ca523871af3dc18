//! Shared human-readable rendering

use colored::Colorize;
use loadout_core::sync::{ApplyReport, SyncTree, TreeSummary};
use loadout_core::Actions;

pub(crate) fn print_summary(summary: &TreeSummary) {
    println!("{}:      {}", "Paths".dimmed(), summary.total);
    println!("{}:    {}", "In sync".dimmed(), summary.in_sync.to_string().green());
    println!("{}:    {}", "Pending".dimmed(), summary.pending.to_string().cyan());
    println!("{}:  {}", "Conflicts".dimmed(), colour_count(summary.conflicts));
    println!("{}: {}", "Unarchived".dimmed(), colour_count(summary.unable_to_extract));
}

/// One line per node that is not already in sync.
pub(crate) fn print_pending(tree: &SyncTree) {
    for node in tree.pending() {
        let marker = if node.actions == Actions::WARN_OF_CONFLICT {
            "!".red().bold()
        } else if node.actions.is_warning() {
            "?".yellow().bold()
        } else {
            "*".cyan()
        };
        println!(
            "  {} {} {} {}",
            marker,
            node.path,
            format!("[{}]", node.signature).dimmed(),
            node.actions
        );
    }
}

pub(crate) fn print_report(report: &ApplyReport) {
    for diagnostic in &report.diagnostics {
        println!("{} {}", "WARN".yellow().bold(), diagnostic);
    }
    for failure in &report.failures {
        println!(
            "{} {} ({}): {}",
            "FAIL".red().bold(),
            failure.path,
            failure.kind,
            failure.message
        );
    }

    println!();
    println!("{}:   {}", "Completed".dimmed(), report.completed);
    println!(
        "{}:   {} ({} bytes, {} already archived)",
        "Backed up".dimmed(),
        report.backed_up,
        report.backup_bytes,
        report.backups_skipped
    );
    println!("{}:   {}", "Extracted".dimmed(), report.extracted);
    println!("{}:     {}", "Deleted".dimmed(), report.deleted);
    println!(
        "{}:    {} ingested, {} tombstoned",
        "Loadout".dimmed(),
        report.ingested,
        report.tombstoned
    );
    if report.cancelled {
        println!(
            "{} Cancelled with {} paths left for the next pass",
            "!".yellow().bold(),
            report.skipped.len()
        );
    }
}

fn colour_count(count: usize) -> colored::ColoredString {
    if count == 0 {
        count.to_string().normal()
    } else {
        count.to_string().yellow().bold()
    }
}
