//! In-memory collaborators with fault injection.
//!
//! Every type is internally synchronized so it can be shared with the
//! worker threads of a pass.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use loadout_core::sync::CancellationFlag;
use loadout_core::{
    ContentArchive, DiskState, Error, Fingerprint, FingerprintSource, GamePath, GameFiles,
    LoadoutBatch, LoadoutEntry, LoadoutProvider, LoadoutStore, Manifest, Result, Snapshot,
    SnapshotStore,
};

fn io_error(path: &GamePath, source: std::io::Error) -> Error {
    loadout_fs::Error::io(path.to_string(), source).into()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Default)]
struct DiskFaults {
    fail_io: HashSet<GamePath>,
    corrupt_writes: HashSet<GamePath>,
    /// Content swapped in the first time a path is read or fingerprinted.
    change_on_access: HashMap<GamePath, Vec<u8>>,
    unavailable: bool,
    cancel_after_writes: Option<(CancellationFlag, usize)>,
}

/// Managed locations held in a map.
#[derive(Default)]
pub struct MemoryDisk {
    files: Mutex<BTreeMap<GamePath, Vec<u8>>>,
    faults: Mutex<DiskFaults>,
    writes: Mutex<Vec<GamePath>>,
}

impl MemoryDisk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, path: &GamePath, content: &[u8]) {
        lock(&self.files).insert(path.clone(), content.to_vec());
    }

    pub fn remove(&self, path: &GamePath) {
        lock(&self.files).remove(path);
    }

    pub fn content(&self, path: &GamePath) -> Option<Vec<u8>> {
        lock(&self.files).get(path).cloned()
    }

    /// Fingerprints of everything currently held, as a scan would report.
    pub fn state(&self) -> DiskState {
        lock(&self.files)
            .iter()
            .map(|(path, content)| (path.clone(), Fingerprint::of(content)))
            .collect()
    }

    /// Paths written so far, in write order.
    pub fn writes(&self) -> Vec<GamePath> {
        lock(&self.writes).clone()
    }

    /// Every operation on `path` fails with an I/O error.
    pub fn fail_io(&self, path: &GamePath) {
        lock(&self.faults).fail_io.insert(path.clone());
    }

    /// Writes to `path` store flipped bytes.
    pub fn corrupt_writes(&self, path: &GamePath) {
        lock(&self.faults).corrupt_writes.insert(path.clone());
    }

    /// Simulate another process replacing `path` after the scan.
    pub fn change_on_access(&self, path: &GamePath, content: &[u8]) {
        lock(&self.faults)
            .change_on_access
            .insert(path.clone(), content.to_vec());
    }

    /// Every operation fails as if the location root was unmounted.
    pub fn set_unavailable(&self, unavailable: bool) {
        lock(&self.faults).unavailable = unavailable;
    }

    /// Trip `flag` once `writes` files have been written.
    pub fn cancel_after_writes(&self, flag: &CancellationFlag, writes: usize) {
        lock(&self.faults).cancel_after_writes = Some((flag.clone(), writes));
    }

    fn check(&self, path: &GamePath) -> Result<()> {
        let mut faults = lock(&self.faults);
        if faults.unavailable {
            return Err(Error::LocationUnavailable {
                location: path.location().to_string(),
                root: "memory".into(),
            });
        }
        if faults.fail_io.contains(path) {
            return Err(io_error(path, std::io::Error::other("injected failure")));
        }
        if let Some(content) = faults.change_on_access.remove(path) {
            lock(&self.files).insert(path.clone(), content);
        }
        Ok(())
    }
}

impl GameFiles for MemoryDisk {
    fn read(&self, path: &GamePath) -> Result<Vec<u8>> {
        self.check(path)?;
        self.content(path).ok_or_else(|| {
            io_error(path, std::io::Error::from(std::io::ErrorKind::NotFound))
        })
    }

    fn write(&self, path: &GamePath, content: &[u8]) -> Result<()> {
        self.check(path)?;
        let mut stored = content.to_vec();
        {
            let mut faults = lock(&self.faults);
            if faults.corrupt_writes.contains(path) {
                for byte in &mut stored {
                    *byte = !*byte;
                }
                if stored.is_empty() {
                    stored.push(0);
                }
            }
            if let Some((flag, remaining)) = faults.cancel_after_writes.as_mut() {
                *remaining = remaining.saturating_sub(1);
                if *remaining == 0 {
                    flag.cancel();
                }
            }
        }
        lock(&self.files).insert(path.clone(), stored);
        lock(&self.writes).push(path.clone());
        Ok(())
    }

    fn delete(&self, path: &GamePath) -> Result<bool> {
        self.check(path)?;
        Ok(lock(&self.files).remove(path).is_some())
    }

    fn fingerprint(&self, path: &GamePath) -> Result<Option<Fingerprint>> {
        self.check(path)?;
        Ok(lock(&self.files).get(path).map(|content| Fingerprint::of(content)))
    }

    fn remove_empty_dirs(&self, _deleted: &[GamePath]) -> Result<usize> {
        // No directories to leave behind
        Ok(0)
    }
}

/// Blobs held in a map.
#[derive(Default)]
pub struct MemoryArchive {
    blobs: Mutex<HashMap<Fingerprint, Vec<u8>>>,
    /// Claimed present but unreadable.
    phantom: Mutex<HashSet<Fingerprint>>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `content` and return its fingerprint.
    pub fn insert(&self, content: &[u8]) -> Fingerprint {
        let fingerprint = Fingerprint::of(content);
        lock(&self.blobs).insert(fingerprint, content.to_vec());
        fingerprint
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        lock(&self.blobs).contains_key(fingerprint)
    }

    pub fn len(&self) -> usize {
        lock(&self.blobs).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Report `content` as archived while failing every read of it.
    pub fn insert_phantom(&self, content: &[u8]) -> Fingerprint {
        let fingerprint = Fingerprint::of(content);
        lock(&self.phantom).insert(fingerprint);
        fingerprint
    }
}

impl ContentArchive for MemoryArchive {
    fn have_file(&self, fingerprint: &Fingerprint) -> Result<bool> {
        Ok(self.contains(fingerprint) || lock(&self.phantom).contains(fingerprint))
    }

    fn read(&self, fingerprint: &Fingerprint) -> Result<Vec<u8>> {
        lock(&self.blobs)
            .get(fingerprint)
            .cloned()
            .ok_or_else(|| Error::ArchiveMissing {
                fingerprint: *fingerprint,
                message: "blob not present".to_string(),
            })
    }

    fn write(&self, fingerprint: &Fingerprint, content: &[u8]) -> Result<()> {
        lock(&self.blobs).insert(*fingerprint, content.to_vec());
        Ok(())
    }
}

/// A loadout manifest with commit tracking.
#[derive(Default)]
pub struct MemoryLoadout {
    manifest: Mutex<Manifest>,
    reject: Mutex<bool>,
    commits: Mutex<Vec<LoadoutBatch>>,
}

impl MemoryLoadout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, path: &GamePath, entry: LoadoutEntry) {
        lock(&self.manifest).insert(path.clone(), entry);
    }

    pub fn manifest(&self) -> Manifest {
        lock(&self.manifest).clone()
    }

    pub fn with_manifest<R>(&self, f: impl FnOnce(&mut Manifest) -> R) -> R {
        f(&mut lock(&self.manifest))
    }

    /// Make every following commit fail.
    pub fn reject_commits(&self, reject: bool) {
        *lock(&self.reject) = reject;
    }

    /// Batches committed so far.
    pub fn commits(&self) -> Vec<LoadoutBatch> {
        lock(&self.commits).clone()
    }
}

impl LoadoutProvider for MemoryLoadout {
    fn paths(&self) -> Result<Vec<GamePath>> {
        lock(&self.manifest).paths()
    }

    fn entry(&self, path: &GamePath) -> Result<Option<LoadoutEntry>> {
        Ok(lock(&self.manifest).get(path))
    }

    fn is_ignored(&self, path: &GamePath) -> Result<bool> {
        Ok(lock(&self.manifest).is_ignored(path))
    }
}

impl LoadoutStore for MemoryLoadout {
    fn commit(&self, batch: LoadoutBatch) -> Result<()> {
        if *lock(&self.reject) {
            return Err(Error::LoadoutRejected {
                message: "injected rejection".to_string(),
            });
        }
        lock(&self.commits).push(batch.clone());
        lock(&self.manifest).apply(batch);
        Ok(())
    }
}

/// A snapshot store that counts commits.
#[derive(Default)]
pub struct MemorySnapshot {
    snapshot: Mutex<Snapshot>,
    commits: Mutex<usize>,
}

impl MemorySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, path: &GamePath, fingerprint: Option<Fingerprint>) {
        lock(&self.snapshot).set(path.clone(), fingerprint);
    }

    pub fn get(&self, path: &GamePath) -> Option<Fingerprint> {
        lock(&self.snapshot).get(path)
    }

    pub fn snapshot(&self) -> Snapshot {
        lock(&self.snapshot).clone()
    }

    pub fn commits(&self) -> usize {
        *lock(&self.commits)
    }
}

impl SnapshotStore for MemorySnapshot {
    fn load(&self) -> Result<Snapshot> {
        Ok(self.snapshot())
    }

    fn commit(&self, snapshot: &Snapshot) -> Result<()> {
        *lock(&self.snapshot) = snapshot.clone();
        *lock(&self.commits) += 1;
        Ok(())
    }
}

impl FingerprintSource for MemorySnapshot {
    fn paths(&self) -> Result<Vec<GamePath>> {
        lock(&self.snapshot).paths()
    }

    fn fingerprint(&self, path: &GamePath) -> Result<Option<Fingerprint>> {
        Ok(self.get(path))
    }
}
