//! Preview of what an apply pass would do to disk

use serde::Serialize;
use std::fmt;

use crate::model::{Fingerprint, GamePath};
use crate::rules::Actions;

use super::node::SyncNode;

/// How a path on disk would change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    None,
    Added,
    Modified,
    Removed,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "unchanged",
            Self::Added => "added",
            Self::Modified => "modified",
            Self::Removed => "removed",
        })
    }
}

/// One row of a loadout-to-disk diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffEntry {
    pub path: GamePath,
    pub change: ChangeKind,
    /// The content the path ends up with, or the content removed.
    pub fingerprint: Option<Fingerprint>,
}

impl DiffEntry {
    /// Diff row for a resolved node. `None` for paths that neither exist on
    /// disk nor will after the pass.
    pub fn from_node(node: &SyncNode) -> Option<Self> {
        let actions = node.actions;
        let (change, fingerprint) = if actions.contains(Actions::DO_NOTHING) {
            (ChangeKind::None, node.loadout)
        } else if actions.contains(Actions::WARN_OF_UNABLE_TO_EXTRACT) {
            // Nothing reaches disk; the path keeps whatever it holds now
            (ChangeKind::None, node.disk)
        } else if actions.contains(Actions::EXTRACT_TO_DISK) {
            let change = if actions.contains(Actions::DELETE_FROM_DISK) {
                ChangeKind::Modified
            } else {
                ChangeKind::Added
            };
            (change, node.loadout)
        } else if actions.contains(Actions::DELETE_FROM_DISK) {
            (ChangeKind::Removed, node.disk)
        } else if actions.contains(Actions::INGEST_FROM_DISK) {
            (ChangeKind::None, node.disk)
        } else if actions.contains(Actions::ADD_REIFIED_DELETE) {
            return None;
        } else {
            (ChangeKind::None, None)
        };

        Some(Self {
            path: node.path.clone(),
            change,
            fingerprint,
        })
    }
}
