//! Managed locations on the local filesystem
//!
//! [`LocationRegister`] maps location ids to root directories and is the
//! disk mutation surface used by the apply pass. [`DiskScanner`] walks the
//! roots and fingerprints every file, producing the Disk channel.

use loadout_fs::{NormalizedPath, io};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::model::{Fingerprint, GamePath, LocationId};
use crate::providers::{FingerprintSource, GameFiles};
use crate::{Error, Result};

/// Location id → root directory.
#[derive(Debug, Clone, Default)]
pub struct LocationRegister {
    roots: BTreeMap<LocationId, NormalizedPath>,
}

impl LocationRegister {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `root` for `location`, replacing any previous root.
    pub fn with(mut self, location: LocationId, root: impl AsRef<Path>) -> Self {
        self.insert(location, root);
        self
    }

    pub fn insert(&mut self, location: LocationId, root: impl AsRef<Path>) {
        self.roots.insert(location, NormalizedPath::new(root));
    }

    pub fn locations(&self) -> impl Iterator<Item = (&LocationId, &NormalizedPath)> {
        self.roots.iter()
    }

    pub fn root(&self, location: &LocationId) -> Result<&NormalizedPath> {
        self.roots
            .get(location)
            .ok_or_else(|| Error::UnknownLocation {
                location: location.to_string(),
            })
    }

    /// Absolute path of a managed file.
    pub fn resolve(&self, path: &GamePath) -> Result<NormalizedPath> {
        Ok(self.root(path.location())?.join(path.relative().as_str()))
    }

    /// Fail with [`Error::LocationUnavailable`] unless the location's root
    /// directory exists.
    pub fn ensure_available(&self, location: &LocationId) -> Result<&NormalizedPath> {
        let root = self.root(location)?;
        if !root.is_dir() {
            return Err(Error::LocationUnavailable {
                location: location.to_string(),
                root: root.to_native(),
            });
        }
        Ok(root)
    }
}

impl GameFiles for LocationRegister {
    fn read(&self, path: &GamePath) -> Result<Vec<u8>> {
        self.ensure_available(path.location())?;
        Ok(io::read_bytes(&self.resolve(path)?)?)
    }

    fn write(&self, path: &GamePath, content: &[u8]) -> Result<()> {
        self.ensure_available(path.location())?;
        let target = self.resolve(path)?;
        io::write_atomic(&target, content)?;

        if io::wants_executable_bit(path.relative()) {
            io::mark_executable(&target.to_native())?;
        }
        Ok(())
    }

    fn delete(&self, path: &GamePath) -> Result<bool> {
        self.ensure_available(path.location())?;
        Ok(io::remove_file(&self.resolve(path)?)?)
    }

    fn fingerprint(&self, path: &GamePath) -> Result<Option<Fingerprint>> {
        self.ensure_available(path.location())?;
        let native = self.resolve(path)?.to_native();
        match loadout_fs::digest_file(&native) {
            Ok(digest) => Ok(Some(digest.into())),
            Err(e) if e.io_kind() == Some(std::io::ErrorKind::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn remove_empty_dirs(&self, deleted: &[GamePath]) -> Result<usize> {
        // Deepest first so a parent sees its children already gone
        let mut dirs: BTreeSet<(usize, LocationId, NormalizedPath)> = BTreeSet::new();
        for path in deleted {
            if let Some(parent) = path.parent_dir() {
                let depth = parent.as_str().matches('/').count();
                dirs.insert((usize::MAX - depth, path.location().clone(), parent));
            }
        }

        let mut removed = 0;
        for (_, location, dir) in dirs {
            let root = self.root(&location)?;
            removed += io::remove_empty_dirs(&root.join(dir.as_str()), root)?;
        }
        if removed > 0 {
            tracing::debug!(removed, "Removed empty directories");
        }
        Ok(removed)
    }
}

/// Fingerprints of every file currently on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiskState {
    files: BTreeMap<GamePath, Fingerprint>,
}

impl DiskState {
    pub fn get(&self, path: &GamePath) -> Option<Fingerprint> {
        self.files.get(path).copied()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&GamePath, &Fingerprint)> {
        self.files.iter()
    }
}

impl FromIterator<(GamePath, Fingerprint)> for DiskState {
    fn from_iter<I: IntoIterator<Item = (GamePath, Fingerprint)>>(iter: I) -> Self {
        Self {
            files: iter.into_iter().collect(),
        }
    }
}

impl FingerprintSource for DiskState {
    fn paths(&self) -> Result<Vec<GamePath>> {
        Ok(self.files.keys().cloned().collect())
    }

    fn fingerprint(&self, path: &GamePath) -> Result<Option<Fingerprint>> {
        Ok(self.get(path))
    }
}

/// Walks every registered location and hashes what it finds.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskScanner;

impl DiskScanner {
    /// Scan all locations.
    ///
    /// Leftover temp files from interrupted atomic writes are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LocationUnavailable`] if a root directory is missing.
    pub fn scan(&self, locations: &LocationRegister) -> Result<DiskState> {
        let mut files = BTreeMap::new();
        for (location, _) in locations.locations() {
            let root = locations.ensure_available(location)?;
            self.scan_location(location, root, &mut files)?;
        }
        tracing::debug!(files = files.len(), "Scanned disk");
        Ok(DiskState { files })
    }

    fn scan_location(
        &self,
        location: &LocationId,
        root: &NormalizedPath,
        files: &mut BTreeMap<GamePath, Fingerprint>,
    ) -> Result<()> {
        let native_root = root.to_native();
        let canonical_root: PathBuf =
            dunce::canonicalize(&native_root).map_err(|e| loadout_fs::Error::io(&native_root, e))?;

        for entry in WalkDir::new(&canonical_root).follow_links(false) {
            let entry = entry.map_err(|e| {
                let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                loadout_fs::Error::io(path, e.into())
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if entry
                .file_name()
                .to_string_lossy()
                .ends_with(io::TEMP_SUFFIX)
            {
                tracing::debug!(path = %entry.path().display(), "Skipping leftover temp file");
                continue;
            }

            let Ok(relative) = entry.path().strip_prefix(&canonical_root) else {
                continue;
            };
            let relative = NormalizedPath::new(relative);
            let path = GamePath::new(location.clone(), relative.as_str())?;
            let fingerprint = loadout_fs::digest_file(entry.path())?.into();
            files.insert(path, fingerprint);
        }
        Ok(())
    }
}
