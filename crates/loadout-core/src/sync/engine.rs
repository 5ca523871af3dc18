//! High-level entry points
//!
//! [`Synchronizer`] wires the tree builder and apply executor to a set of
//! collaborators. [`Workspace`] owns the file-backed collaborators described
//! by a [`SyncConfig`] and is what the CLI drives.

use crate::archive::FsArchive;
use crate::config::{DEFAULT_IO_CONCURRENCY, DEFAULT_MAX_BACKUP_SIZE, SyncConfig};
use crate::disk::{DiskScanner, DiskState, LocationRegister};
use crate::loadout::ManifestFile;
use crate::providers::{
    ContentArchive, FingerprintSource, GameFiles, LoadoutProvider, LoadoutStore, SnapshotStore,
};
use crate::rules::{ActionResolver, TableResolver};
use crate::snapshot::SnapshotFile;
use crate::Result;

use super::apply::ApplyExecutor;
use super::cancel::CancellationFlag;
use super::diff::DiffEntry;
use super::report::ApplyReport;
use super::tree::{SyncTree, SyncTreeBuilder};

/// Runs reconciliation passes against a set of collaborators.
///
/// The Disk channel is passed to every call rather than held, since it must
/// be rescanned before each pass.
pub struct Synchronizer<'a> {
    files: &'a dyn GameFiles,
    archive: &'a dyn ContentArchive,
    loadout: &'a dyn LoadoutProvider,
    loadout_store: &'a dyn LoadoutStore,
    snapshots: &'a dyn SnapshotStore,
    resolver: &'a dyn ActionResolver,
    max_backup_size: u64,
    io_concurrency: usize,
}

impl<'a> Synchronizer<'a> {
    pub fn new(
        files: &'a dyn GameFiles,
        archive: &'a dyn ContentArchive,
        loadout: &'a dyn LoadoutProvider,
        loadout_store: &'a dyn LoadoutStore,
        snapshots: &'a dyn SnapshotStore,
    ) -> Self {
        Self {
            files,
            archive,
            loadout,
            loadout_store,
            snapshots,
            resolver: &TableResolver,
            max_backup_size: DEFAULT_MAX_BACKUP_SIZE,
            io_concurrency: DEFAULT_IO_CONCURRENCY,
        }
    }

    pub fn with_resolver(mut self, resolver: &'a dyn ActionResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_max_backup_size(mut self, bytes: u64) -> Self {
        self.max_backup_size = bytes;
        self
    }

    pub fn with_io_concurrency(mut self, workers: usize) -> Self {
        self.io_concurrency = workers.max(1);
        self
    }

    /// Build the tree for the current state without touching anything.
    pub fn plan(&self, disk: &dyn FingerprintSource) -> Result<SyncTree> {
        let previous = self.snapshots.load()?;
        SyncTreeBuilder::new(disk, &previous, self.loadout, self.archive)
            .with_resolver(self.resolver)
            .build()
    }

    /// Whether a pass would do anything.
    pub fn needs_sync(&self, disk: &dyn FingerprintSource) -> Result<bool> {
        Ok(self.plan(disk)?.needs_apply())
    }

    /// What a pass would do to disk.
    pub fn diff(&self, disk: &dyn FingerprintSource) -> Result<Vec<DiffEntry>> {
        Ok(self.plan(disk)?.diff())
    }

    /// Plan and apply one reconciliation pass.
    pub fn sync(&self, disk: &dyn FingerprintSource, cancel: &CancellationFlag) -> Result<ApplyReport> {
        let tree = self.plan(disk)?;
        self.apply(&tree, cancel)
    }

    /// Force disk to match `baseline`, backing up whatever it replaces.
    ///
    /// No conflicts are detected and the loadout is not consulted.
    pub fn reset(
        &self,
        disk: &dyn FingerprintSource,
        baseline: &dyn LoadoutProvider,
        cancel: &CancellationFlag,
    ) -> Result<ApplyReport> {
        let tree = SyncTreeBuilder::new(disk, disk, baseline, self.archive)
            .with_resolver(self.resolver)
            .build_reset(baseline)?;
        self.apply(&tree, cancel)
    }

    /// Apply an already-built tree.
    pub fn apply(&self, tree: &SyncTree, cancel: &CancellationFlag) -> Result<ApplyReport> {
        ApplyExecutor::new(self.files, self.archive, self.loadout_store, self.snapshots)
            .with_max_backup_size(self.max_backup_size)
            .with_workers(self.io_concurrency)
            .apply(tree, cancel)
    }
}

/// The file-backed collaborators of one configuration.
#[derive(Debug)]
pub struct Workspace {
    config: SyncConfig,
    locations: LocationRegister,
    archive: FsArchive,
    loadout: ManifestFile,
    snapshots: SnapshotFile,
}

impl Workspace {
    /// Open every collaborator named by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the loadout manifest exists but cannot be parsed.
    pub fn open(config: SyncConfig) -> Result<Self> {
        let loadout = config.open_loadout()?;
        Ok(Self {
            locations: config.location_register(),
            archive: config.archive(),
            snapshots: config.snapshot_store(),
            loadout,
            config,
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn locations(&self) -> &LocationRegister {
        &self.locations
    }

    pub fn archive(&self) -> &FsArchive {
        &self.archive
    }

    pub fn loadout(&self) -> &ManifestFile {
        &self.loadout
    }

    pub fn snapshots(&self) -> &SnapshotFile {
        &self.snapshots
    }

    /// Hash everything currently on disk.
    pub fn scan(&self) -> Result<DiskState> {
        DiskScanner.scan(&self.locations)
    }

    pub fn synchronizer(&self) -> Synchronizer<'_> {
        Synchronizer::new(
            &self.locations,
            &self.archive,
            &self.loadout,
            &self.loadout,
            &self.snapshots,
        )
        .with_max_backup_size(self.config.max_backup_size)
        .with_io_concurrency(self.config.workers())
    }
}
