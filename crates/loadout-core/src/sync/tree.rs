//! Building the per-pass sync tree

use serde::Serialize;
use std::collections::BTreeMap;
use std::thread;

use crate::model::GamePath;
use crate::providers::{ContentArchive, FingerprintSource, LoadoutProvider};
use crate::rules::{ActionResolver, Actions, TableResolver};
use crate::{Error, Result};

use super::aggregator::StateAggregator;
use super::diff::DiffEntry;
use super::node::SyncNode;

/// Every path of a pass with its resolved actions, ordered by path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncTree {
    #[serde(serialize_with = "serialize_nodes")]
    nodes: BTreeMap<GamePath, SyncNode>,
}

fn serialize_nodes<S: serde::Serializer>(
    nodes: &BTreeMap<GamePath, SyncNode>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_seq(nodes.values())
}

/// Counts of a tree's nodes by outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TreeSummary {
    pub total: usize,
    pub in_sync: usize,
    pub pending: usize,
    pub conflicts: usize,
    pub unable_to_extract: usize,
}

impl SyncTree {
    pub fn get(&self, path: &GamePath) -> Option<&SyncNode> {
        self.nodes.get(path)
    }

    pub fn contains(&self, path: &GamePath) -> bool {
        self.nodes.contains_key(path)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &SyncNode> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether any path needs work.
    pub fn needs_apply(&self) -> bool {
        self.nodes.values().any(SyncNode::is_pending)
    }

    /// Nodes whose actions are anything but `DoNothing`.
    pub fn pending(&self) -> impl Iterator<Item = &SyncNode> {
        self.nodes.values().filter(|node| node.is_pending())
    }

    /// What applying this tree would do to disk, per path.
    pub fn diff(&self) -> Vec<DiffEntry> {
        self.nodes.values().filter_map(DiffEntry::from_node).collect()
    }

    pub fn summary(&self) -> TreeSummary {
        let mut summary = TreeSummary {
            total: self.nodes.len(),
            ..TreeSummary::default()
        };
        for node in self.nodes.values() {
            match node.actions {
                Actions::DO_NOTHING => summary.in_sync += 1,
                Actions::WARN_OF_CONFLICT => summary.conflicts += 1,
                Actions::WARN_OF_UNABLE_TO_EXTRACT => summary.unable_to_extract += 1,
                _ => summary.pending += 1,
            }
        }
        summary
    }
}

impl FromIterator<SyncNode> for SyncTree {
    fn from_iter<I: IntoIterator<Item = SyncNode>>(iter: I) -> Self {
        Self {
            nodes: iter
                .into_iter()
                .map(|node| (node.path.clone(), node))
                .collect(),
        }
    }
}

/// Assembles a [`SyncTree`] from the three channels.
///
/// Paths are split across scoped worker threads; the providers are only
/// read, and results land in an ordered map, so the tree is identical no
/// matter how the providers enumerate their paths.
pub struct SyncTreeBuilder<'a> {
    disk: &'a dyn FingerprintSource,
    previous: &'a dyn FingerprintSource,
    loadout: &'a dyn LoadoutProvider,
    archive: &'a dyn ContentArchive,
    resolver: &'a dyn ActionResolver,
    workers: usize,
}

impl<'a> SyncTreeBuilder<'a> {
    pub fn new(
        disk: &'a dyn FingerprintSource,
        previous: &'a dyn FingerprintSource,
        loadout: &'a dyn LoadoutProvider,
        archive: &'a dyn ContentArchive,
    ) -> Self {
        Self {
            disk,
            previous,
            loadout,
            archive,
            resolver: &TableResolver,
            workers: thread::available_parallelism().map_or(1, usize::from),
        }
    }

    pub fn with_resolver(mut self, resolver: &'a dyn ActionResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Build the tree for a regular pass.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Provider`] if any channel cannot be read and
    /// [`Error::UnmappedSignature`] if a path classifies to a signature the
    /// resolver has no rule for. Both abort the pass.
    pub fn build(&self) -> Result<SyncTree> {
        let aggregator = StateAggregator::new(self.disk, self.previous, self.loadout, self.archive);
        let tree = self.run(&aggregator)?;

        let summary = tree.summary();
        tracing::info!(
            paths = summary.total,
            pending = summary.pending,
            conflicts = summary.conflicts,
            unable_to_extract = summary.unable_to_extract,
            "Built sync tree"
        );
        Ok(tree)
    }

    /// Build a tree that resets disk to `baseline`.
    ///
    /// The current disk state stands in for both Disk and Previous, so
    /// nothing on disk is treated as a user change and no conflicts arise:
    /// every difference resolves toward the baseline.
    pub fn build_reset(&self, baseline: &dyn LoadoutProvider) -> Result<SyncTree> {
        let aggregator = StateAggregator::new(self.disk, self.disk, baseline, self.archive);
        let tree = self.run(&aggregator)?;
        tracing::info!(paths = tree.len(), pending = tree.pending().count(), "Built reset tree");
        Ok(tree)
    }

    fn run(&self, aggregator: &StateAggregator<'_>) -> Result<SyncTree> {
        let paths = aggregator.paths()?;
        if paths.is_empty() {
            return Ok(SyncTree::default());
        }

        let chunk_size = paths.len().div_ceil(self.workers.max(1)).max(1);
        let chunks: Vec<Result<Vec<SyncNode>>> = thread::scope(|scope| {
            let handles: Vec<_> = paths
                .chunks(chunk_size)
                .map(|chunk| {
                    scope.spawn(move || {
                        chunk
                            .iter()
                            .map(|path| self.resolve(aggregator, path))
                            .collect::<Result<Vec<_>>>()
                    })
                })
                .collect();

            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
                })
                .collect()
        });

        let mut tree = SyncTree::default();
        for chunk in chunks {
            for node in chunk? {
                tree.nodes.insert(node.path.clone(), node);
            }
        }
        Ok(tree)
    }

    fn resolve(&self, aggregator: &StateAggregator<'_>, path: &GamePath) -> Result<SyncNode> {
        let mut node = aggregator.aggregate(path)?;
        node.actions = if node.signature.is_vacant() {
            // Only a tombstone remains; there is nothing left to reconcile
            Actions::DO_NOTHING
        } else {
            self.resolver
                .resolve(&node.signature)
                .ok_or_else(|| Error::UnmappedSignature {
                    signature: node.signature,
                    path: path.clone(),
                })?
        };

        tracing::debug!(
            path = %node.path,
            signature = %node.signature,
            actions = %node.actions,
            "Resolved path"
        );
        Ok(node)
    }
}
