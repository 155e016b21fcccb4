//! Per-item policy and event callbacks supplied by the host application.

use treeline_tree::{AnyItem, NodePolicy};
use treeline_types::{EditingStyle, RowAction};

/// A proposed or committed reparenting of `item`.
#[derive(Clone, Copy, Debug)]
pub struct MoveProposal<'a> {
    pub item: &'a AnyItem,
    /// Position among the current parent's children.
    pub from_index: usize,
    /// `None` for a section root.
    pub old_parent: Option<&'a AnyItem>,
    /// Position among the new parent's children after the move.
    pub to_index: usize,
    pub new_parent: Option<&'a AnyItem>,
}

/// Callbacks the controller consults for every item.
///
/// Only [`NodePolicy::cell_identifier`] and [`TreeDelegate::configure`] are
/// required; everything else defaults to inert behavior: not editable, not
/// movable, events ignored.
pub trait TreeDelegate<C>: NodePolicy {
    /// Fill a freshly dequeued cell for `item`.
    fn configure(&self, cell: &mut C, item: &AnyItem);

    fn did_select(&mut self, _item: &AnyItem) {}

    fn did_deselect(&mut self, _item: &AnyItem) {}

    fn did_expand(&mut self, _item: &AnyItem) {}

    fn did_collapse(&mut self, _item: &AnyItem) {}

    fn can_edit(&self, _item: &AnyItem) -> bool {
        false
    }

    fn editing_style(&self, _item: &AnyItem) -> EditingStyle {
        EditingStyle::None
    }

    fn edit_actions(&self, _item: &AnyItem) -> Option<Vec<RowAction>> {
        None
    }

    fn commit_edit(&mut self, _style: EditingStyle, _item: &AnyItem) {}

    fn accessory_tapped(&mut self, _item: &AnyItem) {}

    /// Whether the row may be dragged at all.
    fn can_move(&self, _item: &AnyItem) -> bool {
        false
    }

    /// Whether the dragged item may be dropped at `proposal`.
    fn can_move_to(&self, _proposal: &MoveProposal<'_>) -> bool {
        false
    }

    /// Called after a drop has been committed to the tree and the view.
    fn move_item(&mut self, _proposal: &MoveProposal<'_>) {}
}
