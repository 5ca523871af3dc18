//! Synchronizer configuration
//!
//! Loaded from TOML, JSON or YAML (picked by extension). Relative paths are
//! resolved against the directory containing the configuration file.
//!
//! ```toml
//! archive_dir = "archive"
//! snapshot_path = "state/snapshot.toml"
//! loadout_path = "loadout.toml"
//! max_backup_size = 2147483648
//! io_concurrency = 4
//!
//! [locations]
//! game = "/games/skyrim"
//! saves = "saves"
//! ```

use loadout_fs::{ConfigStore, NormalizedPath, RobustnessConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::archive::FsArchive;
use crate::disk::LocationRegister;
use crate::loadout::ManifestFile;
use crate::model::LocationId;
use crate::snapshot::SnapshotFile;
use crate::{Error, Result};

/// Backups larger than this in a single pass are refused.
pub const DEFAULT_MAX_BACKUP_SIZE: u64 = 2 * 1024 * 1024 * 1024;

/// Worker threads used for per-path apply work.
pub const DEFAULT_IO_CONCURRENCY: usize = 4;

/// Settings for a synchronizer instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Root directory of every managed location.
    pub locations: BTreeMap<LocationId, PathBuf>,
    /// Content archive directory.
    pub archive_dir: PathBuf,
    /// Where the Previous snapshot is persisted.
    pub snapshot_path: PathBuf,
    /// The loadout manifest.
    pub loadout_path: PathBuf,
    /// Ceiling on the total size of backups one pass may take, in bytes.
    pub max_backup_size: u64,
    /// Number of paths applied concurrently.
    pub io_concurrency: usize,
    /// Lock retry policy for atomic writes.
    pub robustness: RobustnessConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            locations: BTreeMap::new(),
            archive_dir: PathBuf::from("archive"),
            snapshot_path: PathBuf::from("snapshot.toml"),
            loadout_path: PathBuf::from("loadout.toml"),
            max_backup_size: DEFAULT_MAX_BACKUP_SIZE,
            io_concurrency: DEFAULT_IO_CONCURRENCY,
            robustness: RobustnessConfig::default(),
        }
    }
}

impl SyncConfig {
    /// Load and resolve a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigNotFound`] if the file does not exist, or a
    /// parse error if it is malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let config: SyncConfig = ConfigStore::new().load(&NormalizedPath::new(path))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let config = config.resolve_relative_to(base);

        tracing::debug!(
            path = %path.display(),
            locations = config.locations.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Save the configuration as-is.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        ConfigStore::with_robustness(self.robustness).save(&NormalizedPath::new(path), self)?;
        Ok(())
    }

    /// Make every relative path absolute with respect to `base`.
    pub fn resolve_relative_to(mut self, base: &Path) -> Self {
        let anchor = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        for root in self.locations.values_mut() {
            anchor(root);
        }
        anchor(&mut self.archive_dir);
        anchor(&mut self.snapshot_path);
        anchor(&mut self.loadout_path);
        self
    }

    pub fn location_register(&self) -> LocationRegister {
        self.locations
            .iter()
            .fold(LocationRegister::new(), |register, (location, root)| {
                register.with(location.clone(), root)
            })
    }

    pub fn archive(&self) -> FsArchive {
        FsArchive::new(&self.archive_dir)
    }

    pub fn snapshot_store(&self) -> SnapshotFile {
        SnapshotFile::new(&self.snapshot_path).with_robustness(self.robustness)
    }

    pub fn open_loadout(&self) -> Result<ManifestFile> {
        ManifestFile::open_with(&self.loadout_path, self.robustness)
    }

    /// `io_concurrency`, never less than one.
    pub fn workers(&self) -> usize {
        self.io_concurrency.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.max_backup_size, 2_147_483_648);
        assert_eq!(config.io_concurrency, 4);
        assert!(config.locations.is_empty());
    }

    #[test]
    fn load_resolves_relative_paths() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("loadout-sync.toml");
        std::fs::write(
            &path,
            r#"
archive_dir = "blobs"
io_concurrency = 8

[locations]
game = "game"
saves = "/absolute/saves"
"#,
        )
        .unwrap();

        let config = SyncConfig::load(&path).unwrap();

        assert_eq!(config.archive_dir, dir.path().join("blobs"));
        assert_eq!(config.snapshot_path, dir.path().join("snapshot.toml"));
        assert_eq!(config.io_concurrency, 8);
        assert_eq!(config.locations[&LocationId::game()], dir.path().join("game"));
        assert_eq!(
            config.locations[&LocationId::new("saves").unwrap()],
            PathBuf::from("/absolute/saves")
        );
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempdir().unwrap();
        let err = SyncConfig::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, Error::ConfigNotFound { .. }));
    }

    #[test]
    fn bad_location_id_fails_to_parse() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[locations]\n\"../up\" = \"x\"\n").unwrap();
        assert!(SyncConfig::load(&path).is_err());
    }

    #[test]
    fn workers_never_zero() {
        let config = SyncConfig {
            io_concurrency: 0,
            ..SyncConfig::default()
        };
        assert_eq!(config.workers(), 1);
    }
}
