//! Tree-to-list reconciliation for Treeline.
//!
//! [`TreeController`] projects hierarchical content onto the sections and
//! rows of a [`ListView`]. When the content changes it diffs the old and new
//! projections and sends the view one animated batch; it also owns expand
//! and collapse and resolves drag-and-drop targets.
//!
//! # Key Types
//!
//! - [`TreeController`] -- the controller
//! - [`ListView`] / [`ViewBatch`] / [`ViewCommand`] -- the outbound view boundary
//! - [`TreeDelegate`] -- per-item policy and event callbacks
//! - [`ControllerConfig`] -- animation, estimates and background behavior
//! - [`Reconciliation`] -- summary of an applied update
//! - [`RecordingListView`] -- in-memory view for headless use and tests

pub mod background;
pub mod config;
pub mod controller;
pub mod datasource;
pub mod delegate;
pub mod dump;
pub mod error;
pub mod movement;
pub mod reconcile;
pub mod recording;
pub mod rows;
pub mod view;

#[cfg(test)]
pub(crate) mod fixtures;

pub use background::Submission;
pub use config::{ControllerConfig, OverlapPolicy};
pub use controller::TreeController;
pub use delegate::{MoveProposal, TreeDelegate};
pub use dump::{ControllerSnapshot, RowSnapshot, SectionSnapshot};
pub use error::{ControllerError, ControllerResult};
pub use movement::{MoveOutcome, MoveTarget};
pub use reconcile::{plan_reload, plan_subtree, Reconciliation, ReloadPlan, Snapshot, SubtreePlan};
pub use recording::{RecordedCell, RecordingListView};
pub use rows::Rows;
pub use view::{ListView, RowSource, ViewBatch, ViewCommand};
