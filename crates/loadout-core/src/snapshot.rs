//! The Previous snapshot: what the last pass left on disk
//!
//! The snapshot is the only durable state the synchronizer owns. It is
//! rewritten wholesale at the end of every apply pass.

use chrono::{DateTime, Utc};
use loadout_fs::{ConfigStore, NormalizedPath, RobustnessConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::model::{ContentHash, Fingerprint, GamePath, LocationId};
use crate::providers::{FingerprintSource, SnapshotStore};
use crate::{Error, Result};

const SNAPSHOT_VERSION: &str = "1";

/// Fingerprints of every managed path as of the last completed pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SnapshotRepr", into = "SnapshotRepr")]
pub struct Snapshot {
    committed_at: Option<DateTime<Utc>>,
    entries: BTreeMap<GamePath, Fingerprint>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &GamePath) -> Option<Fingerprint> {
        self.entries.get(path).copied()
    }

    /// Set or clear the entry for `path`.
    pub fn set(&mut self, path: GamePath, fingerprint: Option<Fingerprint>) {
        match fingerprint {
            Some(fingerprint) => {
                self.entries.insert(path, fingerprint);
            }
            None => {
                self.entries.remove(&path);
            }
        }
    }

    /// Keep only the entries whose path satisfies `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(&GamePath) -> bool) {
        self.entries.retain(|path, _| keep(path));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&GamePath, &Fingerprint)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// When this snapshot was last committed, if ever.
    pub fn committed_at(&self) -> Option<DateTime<Utc>> {
        self.committed_at
    }

    /// Stamp the snapshot with the current time.
    pub fn touch(&mut self) {
        self.committed_at = Some(Utc::now());
    }
}

impl FromIterator<(GamePath, Fingerprint)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (GamePath, Fingerprint)>>(iter: I) -> Self {
        Self {
            committed_at: None,
            entries: iter.into_iter().collect(),
        }
    }
}

impl FingerprintSource for Snapshot {
    fn paths(&self) -> Result<Vec<GamePath>> {
        Ok(self.entries.keys().cloned().collect())
    }

    fn fingerprint(&self, path: &GamePath) -> Result<Option<Fingerprint>> {
        Ok(self.get(path))
    }
}

/// On-disk layout. Entries are a flat list because TOML tables cannot be
/// keyed by structured paths.
#[derive(Serialize, Deserialize)]
struct SnapshotRepr {
    version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    committed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    entries: Vec<SnapshotEntry>,
}

#[derive(Serialize, Deserialize)]
struct SnapshotEntry {
    location: LocationId,
    path: String,
    hash: ContentHash,
    size: u64,
}

impl TryFrom<SnapshotRepr> for Snapshot {
    type Error = Error;

    fn try_from(repr: SnapshotRepr) -> Result<Self> {
        if repr.version != SNAPSHOT_VERSION {
            return Err(Error::InvalidStateFile {
                kind: "snapshot",
                path: PathBuf::new(),
                message: format!("unsupported version `{}`", repr.version),
            });
        }

        let mut entries = BTreeMap::new();
        for entry in repr.entries {
            let path = GamePath::new(entry.location, &entry.path)?;
            entries.insert(path, Fingerprint::new(entry.hash, entry.size));
        }

        Ok(Self {
            committed_at: repr.committed_at,
            entries,
        })
    }
}

impl From<Snapshot> for SnapshotRepr {
    fn from(snapshot: Snapshot) -> Self {
        let entries = snapshot
            .entries
            .into_iter()
            .map(|(path, fingerprint)| SnapshotEntry {
                location: path.location().clone(),
                path: path.relative().as_str().to_string(),
                hash: fingerprint.hash,
                size: fingerprint.size,
            })
            .collect();

        Self {
            version: SNAPSHOT_VERSION.to_string(),
            committed_at: snapshot.committed_at,
            entries,
        }
    }
}

/// A snapshot persisted as a TOML, JSON or YAML file.
///
/// Reads hold a shared lock on the `snapshot.<ext>.lock` sidecar and
/// commits an exclusive one around a temp-file-then-rename write, so a
/// crash mid-commit leaves the previous snapshot intact.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: NormalizedPath,
    store: ConfigStore,
}

impl SnapshotFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: NormalizedPath::new(path),
            store: ConfigStore::new(),
        }
    }

    pub fn with_robustness(mut self, robustness: RobustnessConfig) -> Self {
        self.store = ConfigStore::with_robustness(robustness);
        self
    }

    pub fn path(&self) -> &NormalizedPath {
        &self.path
    }
}

impl SnapshotStore for SnapshotFile {
    fn load(&self) -> Result<Snapshot> {
        if !self.path.is_file() {
            tracing::debug!(path = %self.path, "No snapshot yet, starting empty");
            return Ok(Snapshot::new());
        }

        self.store.load(&self.path).map_err(|e| match e {
            loadout_fs::Error::ConfigParse { .. } => Error::InvalidStateFile {
                kind: "snapshot",
                path: self.path.to_native(),
                message: e.to_string(),
            },
            other => other.into(),
        })
    }

    fn commit(&self, snapshot: &Snapshot) -> Result<()> {
        let mut stamped = snapshot.clone();
        stamped.touch();
        self.store.save(&self.path, &stamped)?;
        tracing::debug!(path = %self.path, entries = stamped.len(), "Committed snapshot");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> Snapshot {
        [
            (GamePath::game("Data/a.esp").unwrap(), Fingerprint::of(b"a")),
            (GamePath::game("Data/b.esp").unwrap(), Fingerprint::of(b"b")),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn set_none_removes_entry() {
        let mut snapshot = sample();
        let path = GamePath::game("Data/a.esp").unwrap();
        snapshot.set(path.clone(), None);
        assert_eq!(snapshot.get(&path), None);
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempdir().unwrap();
        let store = SnapshotFile::new(dir.path().join("snapshot.toml"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn commit_round_trips_through_toml() {
        let dir = tempdir().unwrap();
        let store = SnapshotFile::new(dir.path().join("snapshot.toml"));

        store.commit(&sample()).unwrap();
        let loaded = store.load().unwrap();

        assert_eq!(loaded.entries, sample().entries);
        assert!(loaded.committed_at().is_some());

        let raw = std::fs::read_to_string(dir.path().join("snapshot.toml")).unwrap();
        assert!(raw.contains("version = \"1\""));
        assert!(raw.contains("Data/a.esp"));
    }

    #[test]
    fn commit_round_trips_through_json() {
        let dir = tempdir().unwrap();
        let store = SnapshotFile::new(dir.path().join("snapshot.json"));

        store.commit(&sample()).unwrap();
        assert_eq!(store.load().unwrap().entries, sample().entries);
    }

    #[test]
    fn unknown_version_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snapshot.toml");
        std::fs::write(&path, "version = \"99\"\n").unwrap();

        let err = SnapshotFile::new(&path).load().unwrap_err();
        assert!(matches!(err, Error::InvalidStateFile { kind: "snapshot", .. }));
    }

    #[test]
    fn load_waits_for_a_committing_writer() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snapshot.toml");
        let impatient = RobustnessConfig {
            retry_locks: false,
            ..RobustnessConfig::default()
        };
        let store = SnapshotFile::new(&path).with_robustness(impatient);
        store.commit(&sample()).unwrap();

        let writer =
            loadout_fs::io::FileLock::exclusive(&NormalizedPath::new(&path), impatient).unwrap();
        assert!(matches!(
            store.load(),
            Err(Error::Fs(loadout_fs::Error::LockFailed { .. }))
        ));

        drop(writer);
        assert_eq!(store.load().unwrap().entries, sample().entries);
    }
}
