//! Treeline: hierarchical content presented as a flat, sectioned list.
//!
//! Each top-level item becomes a section; its visible descendants become
//! rows. When the content changes, the controller diffs the old and new
//! projections and sends the view a single animated batch of insertions,
//! deletions, moves and reloads. Expansion state survives updates because
//! nodes are matched by identity rather than by position.
//!
//! This crate re-exports the public API of the workspace:
//!
//! - [`types`] -- index paths, animations and editing affordances
//! - [`diff`] -- the identity model and the Heckel sequence diff
//! - [`tree`] -- the lazy node arena and the flattening projection
//! - [`controller`] -- the update orchestrator, move resolution and the view
//!   boundary
//!
//! Embedders usually need only the items in [`prelude`].

pub use treeline_controller as controller;
pub use treeline_diff as diff;
pub use treeline_tree as tree;
pub use treeline_types as types;

// Re-export key types
pub use treeline_controller::{
    ControllerConfig, ControllerError, ControllerResult, ListView, MoveOutcome, MoveProposal,
    MoveTarget, OverlapPolicy, Reconciliation, RecordedCell, RecordingListView, Submission,
    TreeController, TreeDelegate, ViewBatch, ViewCommand,
};
pub use treeline_diff::{Diff, Diffable};
pub use treeline_tree::{AnyItem, DiffKey, Leaf, NodePolicy, TreeItem};
pub use treeline_types::{AnimationStyle, EditingStyle, IndexPath, RowAction, RowAnimation};

/// The traits and types needed to implement a delegate and drive a view.
pub mod prelude {
    pub use treeline_controller::{
        ControllerConfig, ListView, MoveProposal, Submission, TreeController, TreeDelegate,
        ViewBatch, ViewCommand,
    };
    pub use treeline_diff::Diffable;
    pub use treeline_tree::{AnyItem, NodePolicy, TreeItem};
    pub use treeline_types::{IndexPath, RowAnimation};
}
