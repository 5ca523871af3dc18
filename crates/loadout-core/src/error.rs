//! Error types for loadout-core

use std::path::PathBuf;

use crate::model::{Fingerprint, GamePath};
use crate::rules::Signature;

/// Result type for loadout-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in loadout-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A location identifier is malformed
    #[error("Invalid location id `{id}`")]
    InvalidLocation { id: String },

    /// A game path refers to a location no root is registered for
    #[error("No root registered for location `{location}`")]
    UnknownLocation { location: String },

    /// A location root cannot be reached (unmounted volume, removed directory)
    #[error("Location `{location}` is unavailable at {root}")]
    LocationUnavailable { location: String, root: PathBuf },

    /// One of the three state providers could not be read
    #[error("Failed to read {source_name} state: {message}")]
    Provider {
        source_name: &'static str,
        message: String,
    },

    /// The resolver table has no entry for a reachable signature
    #[error("No action rule for signature {signature} at {path}")]
    UnmappedSignature { signature: Signature, path: GamePath },

    /// The archive reported content available but could not produce it
    #[error("Archive claims to hold {fingerprint} but it cannot be read: {message}")]
    ArchiveMissing {
        fingerprint: Fingerprint,
        message: String,
    },

    /// Bytes do not hash to the fingerprint they were stored or written under
    #[error("Fingerprint mismatch at {path}: expected {expected}, found {actual}")]
    FingerprintMismatch {
        path: GamePath,
        expected: Fingerprint,
        actual: Fingerprint,
    },

    /// Disk content changed between the scan and the apply pass
    #[error("{path} changed on disk since it was scanned")]
    DiskChanged { path: GamePath },

    /// A node carries an action its state cannot support
    #[error("Action {action} is not applicable to {path}: {reason}")]
    InvalidAction {
        path: GamePath,
        action: &'static str,
        reason: &'static str,
    },

    /// Pending backups exceed the configured ceiling
    #[error("Cannot back up files: total size {total} bytes exceeds the limit of {limit} bytes")]
    BackupTooLarge { total: u64, limit: u64 },

    /// The loadout store refused the batched mutations
    #[error("Loadout update rejected: {message}")]
    LoadoutRejected { message: String },

    /// Snapshot or manifest file is unreadable
    #[error("Invalid {kind} file at {path}: {message}")]
    InvalidStateFile {
        kind: &'static str,
        path: PathBuf,
        message: String,
    },

    /// Configuration file not found at expected path
    #[error("Configuration not found at {path}")]
    ConfigNotFound { path: PathBuf },

    // Transparent wrappers for underlying crate errors
    /// Filesystem error from loadout-fs
    #[error(transparent)]
    Fs(#[from] loadout_fs::Error),
}

impl Error {
    /// Whether this failure means the environment itself is gone, so that
    /// continuing with other paths is pointless.
    pub fn is_environment_failure(&self) -> bool {
        matches!(self, Self::LocationUnavailable { .. })
    }
}
