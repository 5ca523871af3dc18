//! Init command implementation

use std::path::Path;

use colored::Colorize;
use loadout_core::{LocationId, SyncConfig};

use crate::error::{CliError, Result};

/// Write a starter configuration managing `game` as the `game` location.
pub fn run_init(
    config_path: &Path,
    game: &Path,
    io_concurrency: Option<usize>,
    force: bool,
) -> Result<()> {
    if config_path.exists() && !force {
        return Err(CliError::user(format!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        )));
    }
    if !game.is_dir() {
        return Err(CliError::user(format!(
            "Game directory {} does not exist",
            game.display()
        )));
    }

    let mut config = SyncConfig::default();
    config.locations.insert(LocationId::game(), game.to_path_buf());
    if let Some(workers) = io_concurrency {
        config.io_concurrency = workers.max(1);
    }
    config.save(config_path)?;

    println!(
        "{} Wrote {}",
        "OK".green().bold(),
        config_path.display().to_string().cyan()
    );
    println!("   {} {}", "game:".dimmed(), game.display());
    println!();
    println!("Run {} to see what a sync would do.", "loadout status".cyan());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn writes_loadable_config() {
        let dir = TempDir::new().unwrap();
        let game = dir.path().join("game");
        std::fs::create_dir(&game).unwrap();
        let config_path = dir.path().join("sync.toml");

        run_init(&config_path, &game, Some(2), false).unwrap();

        let config = SyncConfig::load(&config_path).unwrap();
        assert_eq!(config.locations.get(&LocationId::game()), Some(&game));
        assert_eq!(config.io_concurrency, 2);
    }

    #[test]
    fn refuses_to_overwrite_without_force() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("sync.toml");
        std::fs::write(&config_path, "").unwrap();

        let result = run_init(&config_path, dir.path(), None, false);
        assert!(matches!(result, Err(CliError::User { .. })));
        assert!(run_init(&config_path, dir.path(), None, true).is_ok());
    }

    #[test]
    fn missing_game_directory_is_rejected() {
        let dir = TempDir::new().unwrap();
        let result = run_init(&dir.path().join("sync.toml"), &dir.path().join("nope"), None, false);
        assert!(matches!(result, Err(CliError::User { .. })));
    }
}
