//! Outcome of an apply pass

use serde::Serialize;
use std::fmt;

use crate::Error;
use crate::model::{Fingerprint, GamePath};
use crate::rules::Signature;

/// Why a single path could not be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Reading or writing disk or archive failed.
    Io,
    /// Content written to disk does not hash to what was extracted.
    Corruption,
    /// The archive claimed to hold content it could not produce.
    ArchiveInconsistent,
    /// The file changed between the scan and the apply.
    DiskChanged,
    /// The loadout store refused the batch this path's change was part of.
    LoadoutRejected,
    /// The node's actions do not fit its state.
    InvalidAction,
}

impl FailureKind {
    pub fn of(error: &Error) -> Self {
        match error {
            Error::FingerprintMismatch { .. } => Self::Corruption,
            Error::ArchiveMissing { .. } => Self::ArchiveInconsistent,
            Error::DiskChanged { .. } => Self::DiskChanged,
            Error::LoadoutRejected { .. } => Self::LoadoutRejected,
            Error::InvalidAction { .. } => Self::InvalidAction,
            _ => Self::Io,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Io => "I/O error",
            Self::Corruption => "corruption",
            Self::ArchiveInconsistent => "archive inconsistent",
            Self::DiskChanged => "changed on disk",
            Self::LoadoutRejected => "loadout rejected",
            Self::InvalidAction => "invalid action",
        })
    }
}

/// A path whose actions failed. Its Previous entry is left as it was.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathFailure {
    pub path: GamePath,
    pub kind: FailureKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Disk and loadout changed independently.
    Conflict,
    /// The loadout wants content the archive does not hold.
    UnableToExtract,
}

/// A warning surfaced to the user; no action was taken for the path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub path: GamePath,
    pub kind: DiagnosticKind,
    pub signature: Signature,
    pub disk: Option<Fingerprint>,
    pub loadout: Option<Fingerprint>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            DiagnosticKind::Conflict => {
                write!(f, "{}: disk and loadout both changed ({})", self.path, self.signature)
            }
            DiagnosticKind::UnableToExtract => write!(
                f,
                "{}: loadout content is not in the archive ({})",
                self.path, self.signature
            ),
        }
    }
}

/// Everything an apply pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    /// Paths whose actions all completed, including no-op paths.
    pub completed: usize,
    pub backed_up: usize,
    /// Backups skipped because the archive already held the content.
    pub backups_skipped: usize,
    pub backup_bytes: u64,
    pub extracted: usize,
    pub deleted: usize,
    pub ingested: usize,
    pub tombstoned: usize,
    pub dirs_removed: usize,
    pub diagnostics: Vec<Diagnostic>,
    pub failures: Vec<PathFailure>,
    /// Paths never attempted because the pass was cancelled or aborted.
    pub skipped: Vec<GamePath>,
    pub cancelled: bool,
    pub loadout_committed: bool,
}

impl ApplyReport {
    /// No warnings, no failures, nothing left undone.
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty() && self.failures.is_empty() && self.skipped.is_empty()
    }

    pub fn failures_of(&self, kind: FailureKind) -> impl Iterator<Item = &PathFailure> {
        self.failures.iter().filter(move |failure| failure.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_kinds_follow_error_variants() {
        let path = GamePath::game("a.esp").unwrap();
        let fingerprint = Fingerprint::of(b"a");

        assert_eq!(
            FailureKind::of(&Error::DiskChanged { path: path.clone() }),
            FailureKind::DiskChanged
        );
        assert_eq!(
            FailureKind::of(&Error::ArchiveMissing {
                fingerprint,
                message: String::new()
            }),
            FailureKind::ArchiveInconsistent
        );
        assert_eq!(
            FailureKind::of(&Error::FingerprintMismatch {
                path,
                expected: fingerprint,
                actual: Fingerprint::of(b"b")
            }),
            FailureKind::Corruption
        );
        assert_eq!(
            FailureKind::of(&Error::Fs(loadout_fs::Error::io(
                "Data/a.esp",
                std::io::Error::other("boom")
            ))),
            FailureKind::Io
        );
    }

    #[test]
    fn empty_report_is_clean() {
        assert!(ApplyReport::default().is_clean());
    }
}
