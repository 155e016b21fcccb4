//! Sequence diff engine for Treeline.
//!
//! Computes the edit script between two ordered sequences of identity-bearing
//! values using Paul Heckel's linear-time algorithm. The result reports
//! insertions, deletions, moves and in-place value updates, plus the old/new
//! index correspondence used to drive nested (per-section) diffs.
//!
//! # Key Types
//!
//! - [`Diffable`] -- stable identity (`diff_identifier`) plus value equality
//! - [`Diff`] -- the result of comparing two sequences
//! - [`Operation`] -- one step of the replay-ordered edit script

pub mod diffable;
pub mod heckel;

pub use diffable::Diffable;
pub use heckel::{Diff, Operation};
