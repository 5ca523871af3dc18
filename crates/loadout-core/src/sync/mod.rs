//! Reconciliation passes: build a sync tree, then apply it

mod aggregator;
mod apply;
mod cancel;
mod diff;
mod engine;
mod node;
mod report;
mod tree;

pub use aggregator::StateAggregator;
pub use apply::ApplyExecutor;
pub use cancel::CancellationFlag;
pub use diff::{ChangeKind, DiffEntry};
pub use engine::{Synchronizer, Workspace};
pub use node::SyncNode;
pub use report::{ApplyReport, Diagnostic, DiagnosticKind, FailureKind, PathFailure};
pub use tree::{SyncTree, SyncTreeBuilder, TreeSummary};
