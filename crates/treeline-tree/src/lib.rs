//! Tree node model for Treeline.
//!
//! Wraps caller-supplied hierarchical items in arena-allocated nodes that
//! cache their flattened row counts and sibling offsets, so that the visible
//! row of any item can be computed by walking to its section root and the
//! effect of an expand, collapse or move can be propagated in
//! O(depth × siblings).
//!
//! # Key Types
//!
//! - [`TreeItem`] / [`AnyItem`] -- caller items and their type-erased handle
//! - [`DiffKey`] -- type-erased identity used by the identity map
//! - [`NodePolicy`] -- cell template and initial expansion policy
//! - [`NodeArena`] / [`Node`] / [`NodeId`] -- generational node storage
//! - [`TreeError`] -- structural errors

pub mod arena;
pub mod error;
pub mod item;
pub mod key;
pub mod node;
pub mod policy;

pub use arena::NodeArena;
pub use error::{TreeError, TreeResult};
pub use item::{AnyItem, Leaf, TreeItem};
pub use key::DiffKey;
pub use node::{Node, NodeFlags, NodeId};
pub use policy::{NodePolicy, UniformPolicy};
