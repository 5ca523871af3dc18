//! Per-path reconciliation state

use serde::Serialize;

use crate::model::{Fingerprint, GamePath};
use crate::rules::{Actions, Signature};

/// Everything the synchronizer knows about one path during a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncNode {
    pub path: GamePath,
    pub disk: Option<Fingerprint>,
    pub previous: Option<Fingerprint>,
    pub loadout: Option<Fingerprint>,
    pub disk_archived: bool,
    pub previous_archived: bool,
    pub loadout_archived: bool,
    pub ignored: bool,
    pub signature: Signature,
    /// Empty until the node has been resolved.
    pub actions: Actions,
}

impl SyncNode {
    /// Build an unresolved node, classifying it on the way.
    pub fn new(
        path: GamePath,
        disk: Option<Fingerprint>,
        previous: Option<Fingerprint>,
        loadout: Option<Fingerprint>,
        archived: [bool; 3],
        ignored: bool,
    ) -> Self {
        let signature = Signature::classify(
            [disk.as_ref(), previous.as_ref(), loadout.as_ref()],
            archived,
            ignored,
        );
        Self {
            path,
            disk,
            previous,
            loadout,
            disk_archived: disk.is_some() && archived[0],
            previous_archived: previous.is_some() && archived[1],
            loadout_archived: loadout.is_some() && archived[2],
            ignored,
            signature,
            actions: Actions::NONE,
        }
    }

    /// Recompute the signature from the node's facts.
    pub fn classify(&self) -> Signature {
        Signature::classify(
            [self.disk.as_ref(), self.previous.as_ref(), self.loadout.as_ref()],
            [self.disk_archived, self.previous_archived, self.loadout_archived],
            self.ignored,
        )
    }

    /// Whether applying this node changes anything.
    pub fn is_pending(&self) -> bool {
        self.actions != Actions::DO_NOTHING
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_node_is_classified() {
        let a = Fingerprint::of(b"a");
        let b = Fingerprint::of(b"b");
        let node = SyncNode::new(
            GamePath::game("x.esp").unwrap(),
            Some(a),
            Some(a),
            Some(b),
            [true, true, true],
            false,
        );
        assert_eq!(node.signature.to_string(), "AAB_XXX_i");
        assert_eq!(node.classify(), node.signature);
        assert!(node.actions.is_empty());
    }

    #[test]
    fn absent_channels_drop_archive_flags() {
        let node = SyncNode::new(
            GamePath::game("x.esp").unwrap(),
            None,
            None,
            Some(Fingerprint::of(b"a")),
            [true, true, false],
            true,
        );
        assert!(!node.disk_archived);
        assert_eq!(node.signature.to_string(), "xxA_xxx_I");
    }
}
