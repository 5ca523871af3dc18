//! Command implementations for loadout-cli

pub mod diff;
pub mod init;
mod output;
pub mod reset;
pub mod rules;
pub mod status;
pub mod sync;

pub use diff::run_diff;
pub use init::run_init;
pub use reset::run_reset;
pub use rules::run_rules;
pub use status::run_status;
pub use sync::run_sync;

use std::path::Path;

use loadout_core::{Error, SyncConfig, Workspace};

use crate::error::{CliError, Result};

/// Load the configuration at `config` and open its collaborators.
pub(crate) fn open_workspace(config: &Path) -> Result<Workspace> {
    let config = match SyncConfig::load(config) {
        Ok(config) => config,
        Err(Error::ConfigNotFound { path }) => {
            return Err(CliError::user(format!(
                "No configuration at {}. Run `loadout init --game <dir>` first.",
                path.display()
            )));
        }
        Err(e) => return Err(e.into()),
    };
    Ok(Workspace::open(config)?)
}
