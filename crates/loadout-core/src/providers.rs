//! Collaborator interfaces consumed by the synchronizer
//!
//! The synchronizer never touches the filesystem, the loadout database or the
//! content archive directly. Everything goes through these traits, so the
//! same tree building and apply logic runs against the file-backed
//! implementations in this crate and the in-memory fixtures used in tests.

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::model::{Fingerprint, GamePath};
use crate::snapshot::Snapshot;

/// A read-only view of fingerprints keyed by path.
///
/// Implemented by a disk scan and by the Previous snapshot.
pub trait FingerprintSource: Send + Sync {
    /// Every path this source knows about.
    fn paths(&self) -> Result<Vec<GamePath>>;

    /// The fingerprint at `path`, `None` when the source has nothing there.
    fn fingerprint(&self, path: &GamePath) -> Result<Option<Fingerprint>>;
}

/// What the loadout wants at a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LoadoutEntry {
    /// The file should exist with this content.
    File { fingerprint: Fingerprint },
    /// The file was explicitly deleted by the user.
    Tombstone,
}

impl LoadoutEntry {
    /// The desired fingerprint. Tombstones desire nothing.
    pub fn fingerprint(&self) -> Option<Fingerprint> {
        match self {
            Self::File { fingerprint } => Some(*fingerprint),
            Self::Tombstone => None,
        }
    }
}

/// Read access to the desired state.
pub trait LoadoutProvider: Send + Sync {
    /// Every path with a file entry or a tombstone.
    fn paths(&self) -> Result<Vec<GamePath>>;

    fn entry(&self, path: &GamePath) -> Result<Option<LoadoutEntry>>;

    /// Whether the path is excluded from automatic conflict handling.
    fn is_ignored(&self, path: &GamePath) -> Result<bool>;
}

/// One mutation of the desired state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum LoadoutChange {
    /// Adopt the on-disk content as the desired content.
    Ingest {
        path: GamePath,
        fingerprint: Fingerprint,
    },
    /// Record an explicit deletion.
    Tombstone { path: GamePath },
}

impl LoadoutChange {
    pub fn path(&self) -> &GamePath {
        match self {
            Self::Ingest { path, .. } | Self::Tombstone { path } => path,
        }
    }
}

/// Loadout mutations collected during one apply pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadoutBatch {
    changes: Vec<LoadoutChange>,
}

impl LoadoutBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, change: LoadoutChange) {
        self.changes.push(change);
    }

    pub fn changes(&self) -> &[LoadoutChange] {
        &self.changes
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Sort by path so commits are reproducible.
    pub fn sort(&mut self) {
        self.changes.sort_by(|a, b| a.path().cmp(b.path()));
    }
}

impl IntoIterator for LoadoutBatch {
    type Item = LoadoutChange;
    type IntoIter = std::vec::IntoIter<LoadoutChange>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.into_iter()
    }
}

/// Write access to the desired state.
pub trait LoadoutStore: Send + Sync {
    /// Apply every change or none of them.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::LoadoutRejected`] when the store refuses the batch.
    fn commit(&self, batch: LoadoutBatch) -> Result<()>;
}

/// Persistence for the Previous snapshot.
pub trait SnapshotStore: Send + Sync {
    /// The last committed snapshot, or an empty one before the first pass.
    fn load(&self) -> Result<Snapshot>;

    fn commit(&self, snapshot: &Snapshot) -> Result<()>;
}

/// Content-addressed storage for file bodies.
pub trait ContentArchive: Send + Sync {
    fn have_file(&self, fingerprint: &Fingerprint) -> Result<bool>;

    /// The stored bytes for `fingerprint`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ArchiveMissing`] when the content is not there
    /// or no longer hashes to `fingerprint`.
    fn read(&self, fingerprint: &Fingerprint) -> Result<Vec<u8>>;

    /// Store `content` under `fingerprint`. Durable once this returns.
    fn write(&self, fingerprint: &Fingerprint, content: &[u8]) -> Result<()>;
}

/// Mutation surface for the managed locations.
pub trait GameFiles: Send + Sync {
    fn read(&self, path: &GamePath) -> Result<Vec<u8>>;

    /// Replace the file at `path` atomically; readers never observe a
    /// partially written or absent file.
    fn write(&self, path: &GamePath, content: &[u8]) -> Result<()>;

    /// Remove the file. Returns `false` when it was already gone.
    fn delete(&self, path: &GamePath) -> Result<bool>;

    /// Fingerprint of the file as it is right now.
    fn fingerprint(&self, path: &GamePath) -> Result<Option<Fingerprint>>;

    /// Remove directories left empty after `deleted` files were removed,
    /// walking up from each file's parent.
    ///
    /// Location roots themselves are never removed. Returns the number of
    /// directories removed.
    fn remove_empty_dirs(&self, deleted: &[GamePath]) -> Result<usize>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tombstones_have_no_fingerprint() {
        assert_eq!(LoadoutEntry::Tombstone.fingerprint(), None);
        let fingerprint = Fingerprint::of(b"x");
        assert_eq!(LoadoutEntry::File { fingerprint }.fingerprint(), Some(fingerprint));
    }

    #[test]
    fn batch_sorts_by_path() {
        let mut batch = LoadoutBatch::new();
        batch.push(LoadoutChange::Tombstone {
            path: GamePath::game("b.esp").unwrap(),
        });
        batch.push(LoadoutChange::Ingest {
            path: GamePath::game("a.esp").unwrap(),
            fingerprint: Fingerprint::of(b"a"),
        });
        batch.sort();

        let paths: Vec<_> = batch.changes().iter().map(|c| c.path().to_string()).collect();
        assert_eq!(paths, vec!["{game}/a.esp", "{game}/b.esp"]);
    }
}
