//! [`Fixture`]: the four in-memory collaborators wired into a synchronizer.

use loadout_core::sync::{CancellationFlag, SyncNode, TreeSummary};
use loadout_core::{
    ApplyReport, Fingerprint, GamePath, IgnoreRule, LoadoutEntry, LocationId, Result, SyncTree,
    Synchronizer,
};

use crate::memory::{MemoryArchive, MemoryDisk, MemoryLoadout, MemorySnapshot};

/// A path in the `game` location.
///
/// # Panics
/// Panics if `relative` is not a valid relative path.
pub fn path(relative: &str) -> GamePath {
    GamePath::game(relative).unwrap_or_else(|e| panic!("invalid test path {relative}: {e}"))
}

/// All three channels plus the archive, held in memory.
///
/// Setters take `&self` so a scenario can be assembled in one chain and
/// adjusted between passes.
///
/// # Example
///
/// ```rust,no_run
/// use loadout_test_utils::{Fixture, path};
///
/// let fixture = Fixture::new();
/// fixture.disk("a.esp", b"v1").previous("a.esp", b"v1").loadout("a.esp", b"v2");
/// let report = fixture.sync();
/// assert_eq!(fixture.disk.content(&path("a.esp")), Some(b"v2".to_vec()));
/// # let _ = report;
/// ```
#[derive(Default)]
pub struct Fixture {
    pub disk: MemoryDisk,
    pub archive: MemoryArchive,
    pub loadout: MemoryLoadout,
    pub snapshots: MemorySnapshot,
    workers: Option<usize>,
    max_backup_size: Option<u64>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run apply work on `workers` threads instead of one.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn with_max_backup_size(mut self, bytes: u64) -> Self {
        self.max_backup_size = Some(bytes);
        self
    }

    /// Put `content` on disk.
    pub fn disk(&self, relative: &str, content: &[u8]) -> &Self {
        self.disk.put(&path(relative), content);
        self
    }

    /// Record `content` as what the last pass left on disk.
    pub fn previous(&self, relative: &str, content: &[u8]) -> &Self {
        self.snapshots
            .set(&path(relative), Some(Fingerprint::of(content)));
        self
    }

    /// Want `content` at `relative`, with the content in the archive.
    pub fn loadout(&self, relative: &str, content: &[u8]) -> &Self {
        self.archive.insert(content);
        self.loadout_unarchived(relative, content)
    }

    /// Want `content` at `relative` without archiving it.
    pub fn loadout_unarchived(&self, relative: &str, content: &[u8]) -> &Self {
        self.loadout.set(
            &path(relative),
            LoadoutEntry::File {
                fingerprint: Fingerprint::of(content),
            },
        );
        self
    }

    /// Record an explicit deletion in the loadout.
    pub fn tombstone(&self, relative: &str) -> &Self {
        self.loadout.set(&path(relative), LoadoutEntry::Tombstone);
        self
    }

    /// Put `content` in the archive without referencing it anywhere.
    pub fn archived(&self, content: &[u8]) -> &Self {
        self.archive.insert(content);
        self
    }

    /// Exclude `relative` (file or directory) of the `game` location from
    /// conflict handling.
    pub fn ignore(&self, relative: &str) -> &Self {
        self.loadout.with_manifest(|manifest| {
            manifest.add_ignore(IgnoreRule {
                location: LocationId::game(),
                path: relative.to_string(),
            })
        });
        self
    }

    pub fn synchronizer(&self) -> Synchronizer<'_> {
        let mut synchronizer = Synchronizer::new(
            &self.disk,
            &self.archive,
            &self.loadout,
            &self.loadout,
            &self.snapshots,
        )
        .with_io_concurrency(self.workers.unwrap_or(1));
        if let Some(bytes) = self.max_backup_size {
            synchronizer = synchronizer.with_max_backup_size(bytes);
        }
        synchronizer
    }

    /// Build the tree for the current state.
    ///
    /// # Panics
    /// Panics if planning fails.
    pub fn plan(&self) -> SyncTree {
        self.try_plan().unwrap_or_else(|e| panic!("plan failed: {e}"))
    }

    pub fn try_plan(&self) -> Result<SyncTree> {
        self.synchronizer().plan(&self.disk.state())
    }

    /// The planned node for `relative`.
    ///
    /// # Panics
    /// Panics if no channel knows the path.
    pub fn node(&self, relative: &str) -> SyncNode {
        self.plan()
            .get(&path(relative))
            .cloned()
            .unwrap_or_else(|| panic!("no node for {relative}"))
    }

    pub fn summary(&self) -> TreeSummary {
        self.plan().summary()
    }

    /// Run one pass.
    ///
    /// # Panics
    /// Panics if the pass fails as a whole.
    pub fn sync(&self) -> ApplyReport {
        self.try_sync(&CancellationFlag::new())
            .unwrap_or_else(|e| panic!("sync failed: {e}"))
    }

    pub fn try_sync(&self, cancel: &CancellationFlag) -> Result<ApplyReport> {
        self.synchronizer().sync(&self.disk.state(), cancel)
    }

    /// Run passes until nothing is pending, returning every report.
    ///
    /// # Panics
    /// Panics if the state has not converged after `max_passes`.
    pub fn sync_until_stable(&self, max_passes: usize) -> Vec<ApplyReport> {
        let mut reports = Vec::new();
        for _ in 0..max_passes {
            if !self.plan().needs_apply() {
                return reports;
            }
            reports.push(self.sync());
        }
        assert!(
            !self.plan().needs_apply(),
            "state did not converge after {max_passes} passes"
        );
        reports
    }

    /// Content on disk at `relative`.
    pub fn disk_content(&self, relative: &str) -> Option<Vec<u8>> {
        self.disk.content(&path(relative))
    }

    pub fn previous_of(&self, relative: &str) -> Option<Fingerprint> {
        self.snapshots.get(&path(relative))
    }

    pub fn loadout_of(&self, relative: &str) -> Option<LoadoutEntry> {
        self.loadout.manifest().get(&path(relative))
    }
}
