//! Loadout synchronization core
//!
//! Reconciles three views of every managed game file:
//!
//! - **Disk**: what is on disk right now
//! - **Previous**: what the last synchronization left on disk
//! - **Loadout**: what the user's mod configuration wants
//!
//! Each path's state is reduced to a hash-free [`rules::Signature`], looked
//! up in a fixed action table, and the resulting actions are applied in a
//! crash-safe order. Because the table only maps states to actions, a pass
//! interrupted at any point converges on the next one.

pub mod archive;
pub mod config;
pub mod disk;
pub mod error;
pub mod loadout;
pub mod model;
pub mod providers;
pub mod rules;
pub mod snapshot;
pub mod sync;

pub use archive::FsArchive;
pub use config::SyncConfig;
pub use disk::{DiskScanner, DiskState, LocationRegister};
pub use error::{Error, Result};
pub use loadout::{IgnoreRule, Manifest, ManifestFile};
pub use model::{ContentHash, Fingerprint, GamePath, LocationId};
pub use providers::{
    ContentArchive, FingerprintSource, GameFiles, LoadoutBatch, LoadoutChange, LoadoutEntry,
    LoadoutProvider, LoadoutStore, SnapshotStore,
};
pub use rules::{ActionResolver, Actions, Signature, TableResolver};
pub use snapshot::{Snapshot, SnapshotFile};
pub use sync::{
    ApplyReport, CancellationFlag, SyncNode, SyncTree, SyncTreeBuilder, Synchronizer, Workspace,
};
