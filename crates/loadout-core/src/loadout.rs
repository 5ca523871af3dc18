//! File-backed loadout manifest
//!
//! The manifest is the desired state: which files each managed location
//! should contain, which were explicitly deleted by the user, and which
//! directories are excluded from automatic conflict handling.

use loadout_fs::{ConfigStore, NormalizedPath, RobustnessConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use crate::model::{ContentHash, Fingerprint, GamePath, LocationId};
use crate::providers::{LoadoutBatch, LoadoutChange, LoadoutEntry, LoadoutProvider, LoadoutStore};
use crate::{Error, Result};

const MANIFEST_VERSION: &str = "1";

/// Excludes a file, or a directory and everything below it, from
/// automatic conflict handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoreRule {
    pub location: LocationId,
    /// Relative path of the file or directory. Empty ignores the whole location.
    #[serde(default)]
    pub path: String,
}

impl IgnoreRule {
    pub fn matches(&self, path: &GamePath) -> bool {
        if path.location() != &self.location {
            return false;
        }
        let prefix = self.path.trim_matches('/');
        if prefix.is_empty() {
            return true;
        }
        let relative = path.relative().as_str();
        relative == prefix
            || relative
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

/// The desired state held in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ManifestRepr", into = "ManifestRepr")]
pub struct Manifest {
    entries: BTreeMap<GamePath, LoadoutEntry>,
    ignore: Vec<IgnoreRule>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: GamePath, entry: LoadoutEntry) {
        self.entries.insert(path, entry);
    }

    pub fn remove(&mut self, path: &GamePath) -> Option<LoadoutEntry> {
        self.entries.remove(path)
    }

    pub fn get(&self, path: &GamePath) -> Option<LoadoutEntry> {
        self.entries.get(path).copied()
    }

    pub fn add_ignore(&mut self, rule: IgnoreRule) {
        self.ignore.push(rule);
    }

    pub fn ignore_rules(&self) -> &[IgnoreRule] {
        &self.ignore
    }

    pub fn entries(&self) -> impl Iterator<Item = (&GamePath, &LoadoutEntry)> {
        self.entries.iter()
    }

    pub fn is_ignored(&self, path: &GamePath) -> bool {
        self.ignore.iter().any(|rule| rule.matches(path))
    }

    /// Apply a batch of changes in order.
    pub fn apply(&mut self, batch: LoadoutBatch) {
        for change in batch {
            match change {
                LoadoutChange::Ingest { path, fingerprint } => {
                    self.entries.insert(path, LoadoutEntry::File { fingerprint });
                }
                LoadoutChange::Tombstone { path } => {
                    self.entries.insert(path, LoadoutEntry::Tombstone);
                }
            }
        }
    }
}

impl LoadoutProvider for Manifest {
    fn paths(&self) -> Result<Vec<GamePath>> {
        Ok(self.entries.keys().cloned().collect())
    }

    fn entry(&self, path: &GamePath) -> Result<Option<LoadoutEntry>> {
        Ok(self.get(path))
    }

    fn is_ignored(&self, path: &GamePath) -> Result<bool> {
        Ok(Manifest::is_ignored(self, path))
    }
}

#[derive(Serialize, Deserialize)]
struct ManifestRepr {
    version: String,
    #[serde(default)]
    files: Vec<FileRow>,
    #[serde(default)]
    deleted: Vec<DeletedRow>,
    #[serde(default)]
    ignore: Vec<IgnoreRule>,
}

#[derive(Serialize, Deserialize)]
struct FileRow {
    location: LocationId,
    path: String,
    hash: ContentHash,
    size: u64,
}

#[derive(Serialize, Deserialize)]
struct DeletedRow {
    location: LocationId,
    path: String,
}

impl TryFrom<ManifestRepr> for Manifest {
    type Error = Error;

    fn try_from(repr: ManifestRepr) -> Result<Self> {
        if repr.version != MANIFEST_VERSION {
            return Err(Error::InvalidStateFile {
                kind: "loadout manifest",
                path: PathBuf::new(),
                message: format!("unsupported version `{}`", repr.version),
            });
        }

        let mut entries = BTreeMap::new();
        for row in repr.files {
            let fingerprint = Fingerprint::new(row.hash, row.size);
            entries.insert(
                GamePath::new(row.location, &row.path)?,
                LoadoutEntry::File { fingerprint },
            );
        }
        for row in repr.deleted {
            // A tombstone wins over a file row for the same path
            entries.insert(GamePath::new(row.location, &row.path)?, LoadoutEntry::Tombstone);
        }

        Ok(Self {
            entries,
            ignore: repr.ignore,
        })
    }
}

impl From<Manifest> for ManifestRepr {
    fn from(manifest: Manifest) -> Self {
        let mut files = Vec::new();
        let mut deleted = Vec::new();
        for (path, entry) in manifest.entries {
            let location = path.location().clone();
            let relative = path.relative().as_str().to_string();
            match entry {
                LoadoutEntry::File { fingerprint } => files.push(FileRow {
                    location,
                    path: relative,
                    hash: fingerprint.hash,
                    size: fingerprint.size,
                }),
                LoadoutEntry::Tombstone => deleted.push(DeletedRow {
                    location,
                    path: relative,
                }),
            }
        }

        Self {
            version: MANIFEST_VERSION.to_string(),
            files,
            deleted,
            ignore: manifest.ignore,
        }
    }
}

/// A manifest persisted on disk.
///
/// The file is read once on open. Commits write the whole updated manifest
/// atomically and only then swap the in-memory copy, so a rejected batch
/// leaves both untouched.
#[derive(Debug)]
pub struct ManifestFile {
    path: NormalizedPath,
    store: ConfigStore,
    manifest: RwLock<Manifest>,
}

impl ManifestFile {
    /// Open the manifest at `path`; a missing file is an empty loadout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidStateFile`] if the file exists but cannot be parsed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, RobustnessConfig::default())
    }

    pub fn open_with(path: impl AsRef<Path>, robustness: RobustnessConfig) -> Result<Self> {
        let path = NormalizedPath::new(path);
        let store = ConfigStore::with_robustness(robustness);

        let manifest = if path.is_file() {
            store.load(&path).map_err(|e| Error::InvalidStateFile {
                kind: "loadout manifest",
                path: path.to_native(),
                message: e.to_string(),
            })?
        } else {
            tracing::debug!(path = %path, "No loadout manifest, starting empty");
            Manifest::new()
        };

        Ok(Self {
            path,
            store,
            manifest: RwLock::new(manifest),
        })
    }

    pub fn path(&self) -> &NormalizedPath {
        &self.path
    }

    /// A copy of the current in-memory manifest.
    pub fn manifest(&self) -> Manifest {
        self.manifest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the manifest wholesale and persist it.
    pub fn replace(&self, manifest: Manifest) -> Result<()> {
        self.store.save(&self.path, &manifest)?;
        *self.manifest.write().unwrap_or_else(PoisonError::into_inner) = manifest;
        Ok(())
    }
}

impl LoadoutProvider for ManifestFile {
    fn paths(&self) -> Result<Vec<GamePath>> {
        self.manifest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .paths()
    }

    fn entry(&self, path: &GamePath) -> Result<Option<LoadoutEntry>> {
        Ok(self
            .manifest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path))
    }

    fn is_ignored(&self, path: &GamePath) -> Result<bool> {
        Ok(self
            .manifest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_ignored(path))
    }
}

impl LoadoutStore for ManifestFile {
    fn commit(&self, batch: LoadoutBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let count = batch.len();

        let mut guard = self.manifest.write().unwrap_or_else(PoisonError::into_inner);
        let mut updated = guard.clone();
        updated.apply(batch);

        self.store
            .save(&self.path, &updated)
            .map_err(|e| Error::LoadoutRejected {
                message: e.to_string(),
            })?;
        *guard = updated;

        tracing::info!(path = %self.path, changes = count, "Committed loadout changes");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn ignore(location: &str, path: &str) -> IgnoreRule {
        IgnoreRule {
            location: LocationId::new(location).unwrap(),
            path: path.to_string(),
        }
    }

    #[test]
    fn ignore_rules_match_directories_and_files() {
        let rule = ignore("game", "Data/Textures");
        assert!(rule.matches(&GamePath::game("Data/Textures").unwrap()));
        assert!(rule.matches(&GamePath::game("Data/Textures/sky.dds").unwrap()));
        assert!(!rule.matches(&GamePath::game("Data/TexturesOld/sky.dds").unwrap()));
        assert!(!rule.matches(&GamePath::new(LocationId::new("saves").unwrap(), "Data/Textures/x").unwrap()));

        let whole = ignore("saves", "");
        assert!(whole.matches(&GamePath::new(LocationId::new("saves").unwrap(), "slot1.sav").unwrap()));
    }

    #[test]
    fn apply_records_ingests_and_tombstones() {
        let mut manifest = Manifest::new();
        let a = GamePath::game("a.esp").unwrap();
        let b = GamePath::game("b.esp").unwrap();
        manifest.insert(b.clone(), LoadoutEntry::File { fingerprint: Fingerprint::of(b"old") });

        let mut batch = LoadoutBatch::new();
        batch.push(LoadoutChange::Ingest {
            path: a.clone(),
            fingerprint: Fingerprint::of(b"a"),
        });
        batch.push(LoadoutChange::Tombstone { path: b.clone() });
        manifest.apply(batch);

        assert_eq!(manifest.get(&a).and_then(|e| e.fingerprint()), Some(Fingerprint::of(b"a")));
        assert_eq!(manifest.get(&b), Some(LoadoutEntry::Tombstone));
    }

    #[test]
    fn manifest_file_commit_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("loadout.toml");
        let file = ManifestFile::open(&path).unwrap();

        let target = GamePath::game("Data/new.esp").unwrap();
        let mut batch = LoadoutBatch::new();
        batch.push(LoadoutChange::Ingest {
            path: target.clone(),
            fingerprint: Fingerprint::of(b"new"),
        });
        file.commit(batch).unwrap();

        let reopened = ManifestFile::open(&path).unwrap();
        assert_eq!(
            reopened.entry(&target).unwrap(),
            Some(LoadoutEntry::File { fingerprint: Fingerprint::of(b"new") })
        );
    }

    #[test]
    fn manifest_toml_layout() {
        let mut manifest = Manifest::new();
        manifest.insert(
            GamePath::game("Data/a.esp").unwrap(),
            LoadoutEntry::File { fingerprint: Fingerprint::of(b"a") },
        );
        manifest.insert(GamePath::game("Data/gone.esp").unwrap(), LoadoutEntry::Tombstone);
        manifest.add_ignore(ignore("saves", ""));

        let text = toml::to_string(&manifest).unwrap();
        assert!(text.contains("[[files]]"));
        assert!(text.contains("[[deleted]]"));
        assert!(text.contains("[[ignore]]"));

        let back: Manifest = toml::from_str(&text).unwrap();
        assert_eq!(back, manifest);
    }
}
