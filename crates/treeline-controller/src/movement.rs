//! Drag and drop: mapping a proposed drop row onto a legal place in the tree
//! and committing the move.

use serde::Serialize;
use tracing::{debug, info};
use treeline_tree::{AnyItem, NodeId, TreeError};
use treeline_types::IndexPath;

use crate::controller::TreeController;
use crate::delegate::MoveProposal;
use crate::error::{ControllerError, ControllerResult};
use crate::view::{ListView, ViewBatch, ViewCommand};

/// A legal drop position for a dragged row.
#[derive(Clone, Debug, PartialEq)]
pub struct MoveTarget {
    pub(crate) node: NodeId,
    pub(crate) parent: NodeId,
    pub item: AnyItem,
    pub new_parent: AnyItem,
    /// Position among `new_parent`'s children after the move.
    pub index: usize,
    /// Row the dragged row occupies in the view once dropped.
    pub destination: IndexPath,
}

/// The target last shown to the user, remembered so that the drop commits
/// exactly that.
#[derive(Clone, Debug)]
pub(crate) struct ResolvedMove {
    pub(crate) source: IndexPath,
    pub(crate) target: MoveTarget,
}

/// A committed move.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MoveOutcome {
    pub from: IndexPath,
    pub to: IndexPath,
    /// Rows moved: the dragged row and its visible descendants.
    pub rows: usize,
    pub index: usize,
}

impl<V: ListView> TreeController<V> {
    /// Whether the row at `index_path` may be dragged.
    pub fn can_move_row(&self, index_path: IndexPath) -> bool {
        self.rows
            .get(index_path)
            .is_some_and(|item| self.delegate.can_move(item))
    }

    /// Legal target for dropping the row at `source` near `proposed`, or
    /// `None` if the drop must snap back.
    pub fn resolve_move_target(
        &mut self,
        source: IndexPath,
        proposed: IndexPath,
    ) -> ControllerResult<Option<MoveTarget>> {
        self.ensure_ready()?;
        let item = self
            .rows
            .get(source)
            .cloned()
            .ok_or(ControllerError::RowOutOfBounds(source))?;
        let src = self.node_of(&item)?;
        let Some(src_parent) = self.arena.parent(src) else {
            debug!(%source, "section roots cannot be moved");
            return Ok(None);
        };

        let proposed = self.normalize_proposal(proposed);
        let total = self.rows.total();
        let gs = self.rows.global_index(source);
        let gd = if proposed.section >= self.rows.len() {
            total
        } else {
            self.rows.global_index(proposed).min(total)
        };

        let anchor_index = if proposed.section == source.section && gd > gs {
            Some(gd)
        } else {
            gd.checked_sub(1)
        };
        let anchor = match anchor_index {
            Some(index) => {
                let Some((_, anchor)) = self.rows.at_global(index) else {
                    return Ok(None);
                };
                let anchor = anchor.clone();
                self.node_of(&anchor)?
            }
            None => {
                let Some(&first) = self.sections.first() else {
                    return Ok(None);
                };
                if self.arena.get(first).is_some_and(|n| n.is_rendered()) {
                    debug!("drop above the first section root rejected");
                    return Ok(None);
                }
                first
            }
        };

        let after = self.descend_containers(anchor);
        if self.arena.is_descendant(after, src) {
            debug!(%source, %proposed, "drop inside the dragged subtree rejected");
            return Ok(None);
        }

        let from_index = self.node(src)?.index();
        let old_parent = self.node(src_parent)?.item().clone();

        let after_node = self.node(after)?;
        if after_node.shows_children() {
            let proposal = MoveProposal {
                item: &item,
                from_index,
                old_parent: Some(&old_parent),
                to_index: 0,
                new_parent: Some(after_node.item()),
            };
            if self.delegate.can_move_to(&proposal) {
                let path = self.position_of(after)?;
                let mut destination = path.offset_by(usize::from(after_node.is_rendered()));
                if destination.section == source.section && destination.row > source.row {
                    destination.row -= 1;
                }
                return Ok(Some(MoveTarget {
                    node: src,
                    parent: after,
                    item,
                    new_parent: after_node.item().clone(),
                    index: 0,
                    destination,
                }));
            }
        }

        let mut x = after;
        for _ in 0..=self.arena.len() {
            let Some(parent) = self.arena.parent(x) else {
                break;
            };
            let x_index = self.node(x)?.index();
            let mut index = x_index + 1;
            if parent == src_parent && from_index < index {
                index -= 1;
            }
            let parent_item = self.node(parent)?.item().clone();
            let proposal = MoveProposal {
                item: &item,
                from_index,
                old_parent: Some(&old_parent),
                to_index: index,
                new_parent: Some(&parent_item),
            };
            if self.delegate.can_move_to(&proposal) {
                let path = self.position_of(x)?;
                let rendered = usize::from(self.node(x)?.is_rendered());
                let below = self.arena.number_of_children(x, self.delegate.as_ref())?;
                let mut destination = path.offset_by(rendered + below);
                if destination.section == source.section && destination.row > source.row {
                    destination.row -= 1;
                }
                return Ok(Some(MoveTarget {
                    node: src,
                    parent,
                    item,
                    new_parent: parent_item,
                    index,
                    destination,
                }));
            }
            x = parent;
        }
        debug!(%source, %proposed, "no legal drop target");
        Ok(None)
    }

    /// Row the view should show as the drop position while dragging `source`
    /// over `proposed`. Returns `source` when the drop would snap back.
    pub fn target_index_path_for_move(
        &mut self,
        source: IndexPath,
        proposed: IndexPath,
    ) -> ControllerResult<IndexPath> {
        match self.resolve_move_target(source, proposed)? {
            Some(target) => {
                let destination = target.destination;
                self.last_move = Some(ResolvedMove { source, target });
                Ok(destination)
            }
            None => {
                self.last_move = None;
                Ok(source)
            }
        }
    }

    /// Commit dropping the row at `source` at `destination`.
    ///
    /// If `destination` is the row last returned by
    /// [`TreeController::target_index_path_for_move`] for `source`, that
    /// target is committed; otherwise the target is resolved afresh. Returns
    /// `None` if there is no legal target.
    pub fn move_row(
        &mut self,
        source: IndexPath,
        destination: IndexPath,
    ) -> ControllerResult<Option<MoveOutcome>> {
        self.ensure_ready()?;
        let cached = self
            .last_move
            .take()
            .filter(|m| m.source == source && m.target.destination == destination);
        let target = match cached {
            Some(resolved) => resolved.target,
            None => match self.resolve_move_target(source, destination)? {
                Some(target) => target,
                None => return Ok(None),
            },
        };
        self.commit_move(source, target).map(Some)
    }

    fn commit_move(&mut self, source: IndexPath, target: MoveTarget) -> ControllerResult<MoveOutcome> {
        let src = target.node;
        let old_parent = self
            .arena
            .parent(src)
            .ok_or(TreeError::NotAttached(src))?;
        let old_parent_item = self.node(old_parent)?.item().clone();
        let from_index = self.node(src)?.index();

        let policy = self.delegate.as_ref();
        let count = self.arena.row_contribution(src, policy)?;
        let block_end = source.row + count;
        if self
            .rows
            .section(source.section)
            .map_or(true, |rows| block_end > rows.len())
        {
            return Err(ControllerError::RowOutOfBounds(source));
        }

        self.arena.detach(src, policy)?;
        self.arena.attach(src, target.parent, target.index, policy)?;
        let landed = self.position_of(src)?;

        let block: Vec<AnyItem> = self
            .rows
            .section_mut(source.section)
            .map(|rows| rows.drain(source.row..block_end).collect())
            .unwrap_or_default();
        let rows = self
            .rows
            .section_mut(landed.section)
            .filter(|rows| landed.row <= rows.len())
            .ok_or(ControllerError::RowOutOfBounds(landed))?;
        rows.splice(landed.row..landed.row, block);

        let mut batch = ViewBatch::new();
        for offset in 0..count {
            batch.push(ViewCommand::MoveRow {
                from: source.offset_by(offset),
                to: landed.offset_by(offset),
            });
        }
        self.view.perform_batch(&batch, &self.rows);

        self.delegate.move_item(&MoveProposal {
            item: &target.item,
            from_index,
            old_parent: Some(&old_parent_item),
            to_index: target.index,
            new_parent: Some(&target.new_parent),
        });
        info!(from = %source, to = %landed, rows = count, "row moved");
        Ok(MoveOutcome {
            from: source,
            to: landed,
            rows: count,
            index: target.index,
        })
    }

    /// A proposal past the end of a section means the start of the next
    /// one; past the last section means the end of the list.
    fn normalize_proposal(&self, proposed: IndexPath) -> IndexPath {
        match self.rows.section(proposed.section) {
            Some(rows) if proposed.row >= rows.len() => IndexPath::new(proposed.section + 1, 0),
            _ => proposed,
        }
    }

    /// Follow first children through containers that render no row of
    /// their own.
    fn descend_containers(&self, start: NodeId) -> NodeId {
        let mut current = start;
        for _ in 0..=self.arena.len() {
            let Some(node) = self.arena.get(current) else {
                break;
            };
            if !node.shows_children() {
                break;
            }
            let Some(&first) = node.materialized_children().and_then(|c| c.first()) else {
                break;
            };
            if self.arena.get(first).map_or(true, |n| n.is_rendered()) {
                break;
            }
            current = first;
        }
        current
    }

    fn node(&self, id: NodeId) -> ControllerResult<&treeline_tree::Node> {
        Ok(self.arena.get(id).ok_or(TreeError::StaleNode(id))?)
    }

    fn position_of(&self, id: NodeId) -> ControllerResult<IndexPath> {
        Ok(self.arena.index_path(id).ok_or(TreeError::NotAttached(id))?)
    }
}
