//! Error types for the controller crate.

use thiserror::Error;
use treeline_types::IndexPath;

/// Errors raised by controller operations.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// A row interaction arrived before any content was loaded.
    #[error("no content has been loaded")]
    NotLoaded,

    /// The item's identity has no node in the arena.
    #[error("item is not tracked: {0}")]
    ItemNotFound(String),

    /// The index path names no row the view currently shows.
    #[error("row out of bounds: {0}")]
    RowOutOfBounds(IndexPath),

    /// A mutating call was made while a background job is pending.
    #[error("a background reconciliation is in flight")]
    ReconcileInFlight,

    /// The background worker ended without handing back a plan.
    #[error("background diff failed: {0}")]
    Background(String),

    /// A structural arena operation failed.
    #[error("tree error: {0}")]
    Tree(#[from] treeline_tree::TreeError),

    /// The configuration document could not be parsed.
    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// The state snapshot could not be serialized.
    #[error("snapshot encoding failed: {0}")]
    Snapshot(#[from] serde_json::Error),
}

/// Convenience alias for controller results.
pub type ControllerResult<T> = Result<T, ControllerError>;
