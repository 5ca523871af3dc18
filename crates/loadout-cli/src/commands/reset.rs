//! Reset command implementation

use std::path::Path;

use colored::Colorize;
use loadout_core::ManifestFile;
use loadout_core::sync::{CancellationFlag, SyncTreeBuilder};

use super::open_workspace;
use super::sync::{finish, print_plan};
use crate::error::{CliError, Result};

/// Run the reset command
///
/// The current disk state stands in for the last synchronized state, so
/// every difference from the baseline is resolved toward the baseline.
pub fn run_reset(config: &Path, baseline: &Path, dry_run: bool, json: bool) -> Result<()> {
    if !baseline.is_file() {
        return Err(CliError::user(format!(
            "Baseline manifest {} does not exist",
            baseline.display()
        )));
    }
    let baseline = ManifestFile::open(baseline)?;
    let workspace = open_workspace(config)?;
    let disk = workspace.scan()?;

    if dry_run {
        let tree = SyncTreeBuilder::new(&disk, &disk, &baseline, workspace.archive())
            .build_reset(&baseline)?;
        return print_plan(&tree, json);
    }

    if !json {
        println!(
            "{} Resetting to {}",
            "=>".blue().bold(),
            baseline.path().to_string().cyan()
        );
    }
    let report = workspace
        .synchronizer()
        .reset(&disk, &baseline, &CancellationFlag::new())?;
    finish(&report, json)
}
