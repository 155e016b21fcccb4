//! Foundation types for Treeline.
//!
//! This crate provides the small value types that cross the boundary between
//! the tree controller and the host list view. Every other Treeline crate
//! depends on `treeline-types`.
//!
//! # Key Types
//!
//! - [`IndexPath`] — (section, row) address of a visible row
//! - [`AnimationStyle`] / [`RowAnimation`] — per-operation visual style tokens
//! - [`EditingStyle`] / [`RowAction`] — row editing affordances

pub mod animation;
pub mod editing;
pub mod index_path;

pub use animation::{AnimationStyle, RowAnimation};
pub use editing::{EditingStyle, RowAction, RowActionStyle};
pub use index_path::IndexPath;
