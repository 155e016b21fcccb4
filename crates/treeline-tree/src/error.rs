//! Error types for the tree crate.

use crate::node::NodeId;

/// Errors raised by structural arena operations.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    /// The handle refers to a freed slot or a slot reused by another node.
    #[error("stale node handle: {0:?}")]
    StaleNode(NodeId),

    /// The node has no parent to detach from.
    #[error("node is not attached to a parent: {0:?}")]
    NotAttached(NodeId),

    /// Attaching would make a node its own ancestor.
    #[error("attaching {node:?} under {parent:?} would create a cycle")]
    WouldCycle { node: NodeId, parent: NodeId },

    /// The operation only applies to nodes that occupy a row.
    #[error("node has no row: {0:?}")]
    NotRendered(NodeId),
}

/// Convenience alias for tree results.
pub type TreeResult<T> = Result<T, TreeError>;
