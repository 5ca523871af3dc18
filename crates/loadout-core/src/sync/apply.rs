//! Turning a resolved tree into side effects
//!
//! Per path, flags run in declaration order: backup, ingest, delete,
//! extract, tombstone. A backup is durable before anything destructive
//! happens to the same path, and `DeleteFromDisk | ExtractToDisk` is a single
//! atomic overwrite so the path is never observed missing. Paths are
//! independent and spread over a bounded set of workers.
//!
//! Loadout changes are collected into one batch and committed once every
//! path has run; the Previous snapshot is committed last, covering only
//! paths that fully completed.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError, mpsc};
use std::thread;

use crate::config::{DEFAULT_IO_CONCURRENCY, DEFAULT_MAX_BACKUP_SIZE};
use crate::model::{Fingerprint, GamePath};
use crate::providers::{
    ContentArchive, GameFiles, LoadoutBatch, LoadoutChange, LoadoutStore, SnapshotStore,
};
use crate::rules::Actions;
use crate::snapshot::Snapshot;
use crate::{Error, Result};

use super::cancel::CancellationFlag;
use super::node::SyncNode;
use super::report::{ApplyReport, Diagnostic, DiagnosticKind, FailureKind, PathFailure};
use super::tree::SyncTree;

/// Executes resolved actions against disk, archive and loadout.
pub struct ApplyExecutor<'a> {
    files: &'a dyn GameFiles,
    archive: &'a dyn ContentArchive,
    loadout: &'a dyn LoadoutStore,
    snapshots: &'a dyn SnapshotStore,
    max_backup_size: u64,
    workers: usize,
}

/// What one path's work produced.
#[derive(Debug, Default)]
struct Completed {
    /// What disk holds at the path now.
    disk_after: Option<Fingerprint>,
    change: Option<LoadoutChange>,
    backed_up: Option<u64>,
    backup_skipped: bool,
    extracted: bool,
    deleted: bool,
}

enum Outcome {
    Completed(Completed),
    Failed(PathFailure),
}

impl<'a> ApplyExecutor<'a> {
    pub fn new(
        files: &'a dyn GameFiles,
        archive: &'a dyn ContentArchive,
        loadout: &'a dyn LoadoutStore,
        snapshots: &'a dyn SnapshotStore,
    ) -> Self {
        Self {
            files,
            archive,
            loadout,
            snapshots,
            max_backup_size: DEFAULT_MAX_BACKUP_SIZE,
            workers: DEFAULT_IO_CONCURRENCY,
        }
    }

    pub fn with_max_backup_size(mut self, bytes: u64) -> Self {
        self.max_backup_size = bytes;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Apply every node of `tree`.
    ///
    /// Path-level failures are reported, not returned. The pass itself fails
    /// before any mutation when backups exceed the size ceiling, and after
    /// committing completed paths when a location becomes unavailable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BackupTooLarge`], [`Error::LocationUnavailable`], or
    /// any error from loading or committing the snapshot.
    pub fn apply(&self, tree: &SyncTree, cancel: &CancellationFlag) -> Result<ApplyReport> {
        self.check_backup_size(tree)?;

        let mut snapshot = self.snapshots.load()?;
        let mut report = ApplyReport::default();

        // The snapshot describes exactly the paths of this pass
        snapshot.retain(|path| tree.contains(path));

        let mut work = Vec::new();
        for node in tree.nodes() {
            match node.actions {
                Actions::DO_NOTHING => {
                    snapshot.set(node.path.clone(), node.disk);
                    report.completed += 1;
                }
                Actions::WARN_OF_CONFLICT => {
                    report.diagnostics.push(diagnostic(node, DiagnosticKind::Conflict))
                }
                Actions::WARN_OF_UNABLE_TO_EXTRACT => {
                    report.diagnostics.push(diagnostic(node, DiagnosticKind::UnableToExtract))
                }
                _ => work.push(node),
            }
        }
        for diagnostic in &report.diagnostics {
            tracing::warn!(path = %diagnostic.path, signature = %diagnostic.signature, "{diagnostic}");
        }

        let (outcomes, fatal) = self.run_workers(&work, cancel);

        let mut batch = LoadoutBatch::new();
        let mut awaiting_commit = Vec::new();
        let mut deleted_paths = Vec::new();

        for (index, outcome) in outcomes.into_iter().enumerate() {
            let node = work[index];
            match outcome {
                None => report.skipped.push(node.path.clone()),
                Some(Outcome::Failed(failure)) => {
                    tracing::warn!(path = %failure.path, kind = %failure.kind, "{}", failure.message);
                    report.failures.push(failure);
                }
                Some(Outcome::Completed(done)) => {
                    report.backed_up += usize::from(done.backed_up.is_some());
                    report.backup_bytes += done.backed_up.unwrap_or(0);
                    report.backups_skipped += usize::from(done.backup_skipped);
                    report.extracted += usize::from(done.extracted);
                    if done.deleted {
                        report.deleted += 1;
                        deleted_paths.push(node.path.clone());
                    }

                    match done.change {
                        Some(change) => {
                            batch.push(change);
                            awaiting_commit.push((node.path.clone(), done.disk_after));
                        }
                        None => {
                            snapshot.set(node.path.clone(), done.disk_after);
                            report.completed += 1;
                        }
                    }
                }
            }
        }

        report.cancelled = cancel.is_cancelled() && !report.skipped.is_empty();
        self.commit_loadout(batch, awaiting_commit, &mut snapshot, &mut report);

        if !deleted_paths.is_empty() {
            match self.files.remove_empty_dirs(&deleted_paths) {
                Ok(removed) => report.dirs_removed = removed,
                Err(e) => tracing::warn!(error = %e, "Failed to remove empty directories"),
            }
        }

        self.snapshots.commit(&snapshot)?;

        tracing::info!(
            completed = report.completed,
            failures = report.failures.len(),
            warnings = report.diagnostics.len(),
            skipped = report.skipped.len(),
            "Apply pass finished"
        );

        match fatal {
            Some(error) => Err(error),
            None => Ok(report),
        }
    }

    fn check_backup_size(&self, tree: &SyncTree) -> Result<()> {
        // The archive stores shared content once
        let pending: HashSet<Fingerprint> = tree
            .nodes()
            .filter(|node| node.actions.contains(Actions::BACKUP_FILE) && !node.disk_archived)
            .filter_map(|node| node.disk)
            .collect();
        let total: u64 = pending.iter().map(|fingerprint| fingerprint.size).sum();

        if total > self.max_backup_size {
            return Err(Error::BackupTooLarge {
                total,
                limit: self.max_backup_size,
            });
        }
        Ok(())
    }

    /// Run `work` on the worker pool.
    ///
    /// Returns one slot per node, `None` for nodes never attempted, plus the
    /// first environment failure if one stopped dispatch.
    fn run_workers(
        &self,
        work: &[&SyncNode],
        cancel: &CancellationFlag,
    ) -> (Vec<Option<Outcome>>, Option<Error>) {
        let next = AtomicUsize::new(0);
        let abort = AtomicBool::new(false);
        let fatal: Mutex<Option<Error>> = Mutex::new(None);
        let (sender, receiver) = mpsc::channel();

        thread::scope(|scope| {
            for _ in 0..self.workers.min(work.len()) {
                let sender = sender.clone();
                let (next, abort, fatal) = (&next, &abort, &fatal);
                scope.spawn(move || {
                    loop {
                        if cancel.is_cancelled() || abort.load(Ordering::SeqCst) {
                            break;
                        }
                        let index = next.fetch_add(1, Ordering::SeqCst);
                        let Some(node) = work.get(index) else { break };

                        match self.apply_node(node) {
                            Ok(done) => {
                                let _ = sender.send((index, Outcome::Completed(done)));
                            }
                            Err(e) if e.is_environment_failure() => {
                                tracing::error!(path = %node.path, error = %e, "Stopping pass");
                                abort.store(true, Ordering::SeqCst);
                                let mut slot = fatal.lock().unwrap_or_else(PoisonError::into_inner);
                                if slot.is_none() {
                                    *slot = Some(e);
                                }
                            }
                            Err(e) => {
                                let failure = PathFailure {
                                    path: node.path.clone(),
                                    kind: FailureKind::of(&e),
                                    message: e.to_string(),
                                };
                                let _ = sender.send((index, Outcome::Failed(failure)));
                            }
                        }
                    }
                });
            }
        });
        drop(sender);

        let mut outcomes: Vec<Option<Outcome>> = work.iter().map(|_| None).collect();
        for (index, outcome) in receiver {
            outcomes[index] = Some(outcome);
        }
        let fatal = fatal.into_inner().unwrap_or_else(PoisonError::into_inner);
        (outcomes, fatal)
    }

    fn apply_node(&self, node: &SyncNode) -> Result<Completed> {
        let actions = node.actions;
        let mut done = Completed {
            disk_after: node.disk,
            ..Completed::default()
        };
        // Set once the current disk content has been checked against the scan
        let mut verified = false;

        for flag in actions.iter() {
            match flag {
                Actions::BACKUP_FILE => {
                    let disk = require(node, node.disk, "BackupFile", "nothing on disk to back up")?;
                    if self.archive.have_file(&disk)? {
                        done.backup_skipped = true;
                    } else {
                        let content = self.files.read(&node.path)?;
                        if Fingerprint::of(&content) != disk {
                            return Err(Error::DiskChanged {
                                path: node.path.clone(),
                            });
                        }
                        self.archive.write(&disk, &content)?;
                        done.backed_up = Some(disk.size);
                        verified = true;
                    }
                }
                Actions::INGEST_FROM_DISK => {
                    let fingerprint =
                        require(node, node.disk, "IngestFromDisk", "nothing on disk to ingest")?;
                    done.change = Some(LoadoutChange::Ingest {
                        path: node.path.clone(),
                        fingerprint,
                    });
                }
                Actions::DELETE_FROM_DISK => {
                    if actions.contains(Actions::EXTRACT_TO_DISK) {
                        // Folded into the overwrite below
                        continue;
                    }
                    if !verified {
                        self.ensure_unchanged(node)?;
                        verified = true;
                    }
                    self.files.delete(&node.path)?;
                    done.disk_after = None;
                    done.deleted = true;
                }
                Actions::EXTRACT_TO_DISK => {
                    let wanted =
                        require(node, node.loadout, "ExtractToDisk", "loadout has no content")?;
                    if !verified {
                        self.ensure_unchanged(node)?;
                        verified = true;
                    }
                    let content = self.archive.read(&wanted).map_err(|e| match e {
                        Error::ArchiveMissing { .. } => e,
                        other => Error::ArchiveMissing {
                            fingerprint: wanted,
                            message: other.to_string(),
                        },
                    })?;
                    self.files.write(&node.path, &content)?;

                    let written = self.files.fingerprint(&node.path)?;
                    if written != Some(wanted) {
                        return Err(Error::FingerprintMismatch {
                            path: node.path.clone(),
                            expected: wanted,
                            actual: written.unwrap_or_else(|| Fingerprint::of(&[])),
                        });
                    }
                    done.disk_after = Some(wanted);
                    done.extracted = true;
                }
                Actions::ADD_REIFIED_DELETE => {
                    done.change = Some(LoadoutChange::Tombstone {
                        path: node.path.clone(),
                    });
                }
                _ => {
                    return Err(Error::InvalidAction {
                        path: node.path.clone(),
                        action: flag.name().unwrap_or("unknown"),
                        reason: "not executable alongside other actions",
                    });
                }
            }
        }

        tracing::debug!(path = %node.path, actions = %actions, "Applied path");
        Ok(done)
    }

    /// Fail with [`Error::DiskChanged`] unless disk still holds what was scanned.
    fn ensure_unchanged(&self, node: &SyncNode) -> Result<()> {
        if self.files.fingerprint(&node.path)? != node.disk {
            return Err(Error::DiskChanged {
                path: node.path.clone(),
            });
        }
        Ok(())
    }

    fn commit_loadout(
        &self,
        mut batch: LoadoutBatch,
        awaiting: Vec<(GamePath, Option<Fingerprint>)>,
        snapshot: &mut Snapshot,
        report: &mut ApplyReport,
    ) {
        if batch.is_empty() {
            return;
        }
        batch.sort();
        let ingested = batch
            .changes()
            .iter()
            .filter(|change| matches!(change, LoadoutChange::Ingest { .. }))
            .count();
        let tombstoned = batch.len() - ingested;

        match self.loadout.commit(batch) {
            Ok(()) => {
                report.loadout_committed = true;
                report.ingested = ingested;
                report.tombstoned = tombstoned;
                report.completed += awaiting.len();
                for (path, disk_after) in awaiting {
                    snapshot.set(path, disk_after);
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, paths = awaiting.len(), "Loadout batch rejected");
                let message = e.to_string();
                report.failures.extend(awaiting.into_iter().map(|(path, _)| PathFailure {
                    path,
                    kind: FailureKind::LoadoutRejected,
                    message: message.clone(),
                }));
            }
        }
    }
}

fn diagnostic(node: &SyncNode, kind: DiagnosticKind) -> Diagnostic {
    Diagnostic {
        path: node.path.clone(),
        kind,
        signature: node.signature,
        disk: node.disk,
        loadout: node.loadout,
    }
}

fn require(
    node: &SyncNode,
    value: Option<Fingerprint>,
    action: &'static str,
    reason: &'static str,
) -> Result<Fingerprint> {
    value.ok_or_else(|| Error::InvalidAction {
        path: node.path.clone(),
        action,
        reason,
    })
}
