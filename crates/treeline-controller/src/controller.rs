//! The tree controller: owns the node arena and the flattened rows, and keeps
//! the list view in step with them.

use std::collections::HashSet;
use std::ops::Range;

use tracing::{debug, info, warn};
use treeline_tree::{AnyItem, DiffKey, NodeArena, NodeId, TreeItem};
use treeline_types::{IndexPath, RowAnimation};

use crate::background::BackgroundSlot;
use crate::config::ControllerConfig;
use crate::delegate::TreeDelegate;
use crate::error::{ControllerError, ControllerResult};
use crate::movement::ResolvedMove;
use crate::reconcile::{plan_reload, plan_subtree, Reconciliation, ReloadPlan, Snapshot, SubtreePlan};
use crate::rows::Rows;
use crate::view::ListView;

pub(crate) fn key_of<T: TreeItem>(item: &T) -> DiffKey {
    DiffKey::new(item.diff_identifier())
}

/// Where a single-item update landed in the tree.
pub(crate) enum SubtreeStep {
    /// The item is not tracked, or not attached to any section.
    Skipped,
    /// The item sits under a collapsed ancestor; only counts changed.
    Hidden,
    Ready(PreparedSubtree),
}

/// A subtree whose item has been replaced but whose rows have not yet been
/// spliced into the flat list.
pub(crate) struct PreparedSubtree {
    pub(crate) section: usize,
    /// Rows the subtree occupied before the update.
    pub(crate) range: Range<usize>,
    pub(crate) rows: Vec<AnyItem>,
}

/// How the view presents one row.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct RowState {
    pub(crate) cell_identifier: Option<String>,
    pub(crate) indentation: usize,
    /// `None` unless the row is expandable.
    pub(crate) expanded: Option<bool>,
    pub(crate) estimated_row_height: Option<f64>,
}

/// Drives a [`ListView`] from hierarchical content.
///
/// The controller is single-owner: every method takes `&self` or
/// `&mut self`, and delegate callbacks must not call back into it.
pub struct TreeController<V: ListView> {
    pub(crate) view: V,
    pub(crate) delegate: Box<dyn TreeDelegate<V::Cell>>,
    pub(crate) arena: NodeArena,
    pub(crate) sections: Vec<NodeId>,
    pub(crate) rows: Rows,
    pub(crate) loaded: bool,
    pub(crate) root: Option<AnyItem>,
    pub(crate) config: ControllerConfig,
    pub(crate) background: BackgroundSlot,
    pub(crate) last_move: Option<ResolvedMove>,
}

impl<V: ListView> TreeController<V> {
    pub fn new<D>(view: V, delegate: D) -> Self
    where
        D: TreeDelegate<V::Cell> + 'static,
    {
        Self::with_config(view, delegate, ControllerConfig::default())
    }

    pub fn with_config<D>(view: V, delegate: D, config: ControllerConfig) -> Self
    where
        D: TreeDelegate<V::Cell> + 'static,
    {
        Self {
            view,
            delegate: Box::new(delegate),
            arena: NodeArena::new(),
            sections: Vec::new(),
            rows: Rows::default(),
            loaded: false,
            root: None,
            config,
            background: BackgroundSlot::default(),
            last_move: None,
        }
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    pub fn delegate(&self) -> &dyn TreeDelegate<V::Cell> {
        self.delegate.as_ref()
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn arena(&self) -> &NodeArena {
        &self.arena
    }

    /// The flattened rows the view currently shows.
    pub fn rows(&self) -> &Rows {
        &self.rows
    }

    /// Whether content has been loaded at least once.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// The item whose children form the sections, if content was loaded with
    /// [`TreeController::reload_data_from`].
    pub fn root(&self) -> Option<&AnyItem> {
        self.root.as_ref()
    }

    pub(crate) fn ensure_idle(&self) -> ControllerResult<()> {
        if self.background.is_busy() {
            return Err(ControllerError::ReconcileInFlight);
        }
        Ok(())
    }

    /// Fails before the first load, then behaves like `ensure_idle`.
    pub(crate) fn ensure_ready(&self) -> ControllerResult<()> {
        if !self.loaded {
            return Err(ControllerError::NotLoaded);
        }
        self.ensure_idle()
    }

    /// Presentation of the row at `index_path`. While a background job is
    /// in flight the arena already holds the job's content, so this answers
    /// from the state captured when the job started.
    pub(crate) fn row_state(&self, index_path: IndexPath) -> Option<RowState> {
        if let Some(frozen) = self.background.frozen() {
            return frozen.get(index_path.section)?.get(index_path.row).cloned();
        }
        self.live_row_state(self.rows.get(index_path)?)
    }

    fn live_row_state(&self, item: &AnyItem) -> Option<RowState> {
        let id = self.arena.lookup_item(item)?;
        let node = self.arena.get(id)?;
        Some(RowState {
            cell_identifier: node.cell_identifier().map(str::to_string),
            indentation: self.arena.indentation_level(id),
            expanded: node.is_expandable().then(|| node.is_expanded()),
            estimated_row_height: node.estimated_row_height(),
        })
    }

    /// Capture the presentation of every row on screen.
    pub(crate) fn freeze_rows(&self) -> Vec<Vec<RowState>> {
        self.rows
            .sections()
            .iter()
            .map(|rows| {
                rows.iter()
                    .map(|item| self.live_row_state(item).unwrap_or_default())
                    .collect()
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Whole-content reload
    // -----------------------------------------------------------------------

    /// Replace the content: every item in `content` becomes a section.
    ///
    /// With [`RowAnimation::NONE`] all node state, including expansion, is
    /// discarded and the view reloads from scratch. Otherwise existing nodes
    /// are reused by identity and the view receives an animated batch.
    pub fn reload_data<T: TreeItem>(
        &mut self,
        content: &[T],
        animation: RowAnimation,
    ) -> ControllerResult<Reconciliation> {
        self.ensure_idle()?;
        let content = content.iter().cloned().map(AnyItem::new).collect();
        self.root = None;
        self.reload_items(content, animation)
    }

    /// Replace the content with the children of `root`, which is remembered
    /// so that a later update of `root` reloads everything.
    pub fn reload_data_from<T: TreeItem>(
        &mut self,
        root: &T,
        animation: RowAnimation,
    ) -> ControllerResult<Reconciliation> {
        self.ensure_idle()?;
        let root = AnyItem::new(root.clone());
        let content = root.children().unwrap_or_default();
        let summary = self.reload_items(content, animation)?;
        self.root = Some(root);
        Ok(summary)
    }

    pub(crate) fn reload_items(
        &mut self,
        content: Vec<AnyItem>,
        animation: RowAnimation,
    ) -> ControllerResult<Reconciliation> {
        self.last_move = None;
        if animation.is_none() {
            return self.reload_unanimated(content);
        }
        let old = self.snapshot_sections();
        let (sections, new) = self.materialize_sections(content)?;
        let plan = plan_reload(&old, &new);
        Ok(self.apply_reload(sections, new.rows, plan, animation))
    }

    fn reload_unanimated(&mut self, content: Vec<AnyItem>) -> ControllerResult<Reconciliation> {
        let freed = self.arena.len();
        self.arena.clear();
        self.sections.clear();
        let (sections, new) = self.materialize_sections(content)?;
        self.sections = sections;
        self.rows = Rows::new(new.rows);
        self.loaded = true;
        self.view.reload_data(&self.rows);
        info!(
            sections = self.sections.len(),
            rows = self.rows.total(),
            "content reloaded"
        );
        Ok(Reconciliation::full(freed))
    }

    /// Section keys and rows as the view currently shows them.
    pub(crate) fn snapshot_sections(&self) -> Snapshot {
        Snapshot {
            section_keys: self
                .sections
                .iter()
                .filter_map(|&id| self.arena.get(id))
                .map(|node| node.item().key())
                .collect(),
            rows: self.rows.sections().to_vec(),
        }
    }

    /// Bring every item of `content` into the arena as a section root and
    /// project the new rows. The current sections and rows are left alone.
    pub(crate) fn materialize_sections(
        &mut self,
        content: Vec<AnyItem>,
    ) -> ControllerResult<(Vec<NodeId>, Snapshot)> {
        let policy = self.delegate.as_ref();
        let (ids, rows) = self.arena.reload_pass(|arena| -> ControllerResult<_> {
            let mut ids = Vec::with_capacity(content.len());
            for (section, item) in content.iter().enumerate() {
                let id = arena.materialize(item, policy)?;
                arena.install_root(id, section)?;
                ids.push(id);
            }

            let mut rows = Vec::with_capacity(ids.len());
            for &id in &ids {
                let mut out = Vec::new();
                arena.flatten_into(id, &mut out, policy)?;
                rows.push(out);
            }
            Ok((ids, rows))
        })?;
        let snapshot = Snapshot {
            section_keys: content.iter().map(AnyItem::key).collect(),
            rows,
        };
        Ok((ids, snapshot))
    }

    pub(crate) fn apply_reload(
        &mut self,
        sections: Vec<NodeId>,
        rows: Vec<Vec<AnyItem>>,
        plan: ReloadPlan,
        animation: RowAnimation,
    ) -> Reconciliation {
        let old_sections = std::mem::replace(&mut self.sections, sections);
        let kept: HashSet<NodeId> = self.sections.iter().copied().collect();
        for id in old_sections {
            if !kept.contains(&id) {
                self.arena.uninstall_root(id);
            }
        }
        self.rows = Rows::new(rows);
        self.loaded = true;

        let structural = plan.structural_batch(animation);
        if !structural.is_empty() {
            self.view.perform_batch(&structural, &self.rows);
        }
        let reloads = plan.reload_batch(animation);
        if !reloads.is_empty() {
            self.view.perform_batch(&reloads, &self.rows);
        }

        let freed = self.reclaim(&plan.evicted);
        let summary = Reconciliation::from_reload(&plan, freed);
        info!(
            sections = self.sections.len(),
            rows = self.rows.total(),
            inserted = summary.rows_inserted,
            deleted = summary.rows_deleted,
            moved = summary.rows_moved,
            reloaded = summary.rows_reloaded,
            freed,
            "reload applied"
        );
        summary
    }

    fn reclaim(&mut self, evicted: &[DiffKey]) -> usize {
        let mut freed = 0;
        for key in evicted {
            freed += self.arena.evict(key);
        }
        freed + self.arena.sweep(&self.sections)
    }

    // -----------------------------------------------------------------------
    // Single-item update
    // -----------------------------------------------------------------------

    /// Refresh the rows of one item's subtree after its content changed.
    ///
    /// An item with the remembered root's identity reloads everything. Untracked
    /// items are ignored.
    pub fn update_contents_of<T: TreeItem>(
        &mut self,
        item: &T,
        animation: RowAnimation,
    ) -> ControllerResult<Reconciliation> {
        self.ensure_idle()?;
        self.update_item(AnyItem::new(item.clone()), animation)
    }

    pub(crate) fn is_root(&self, item: &AnyItem) -> bool {
        self.root.as_ref().is_some_and(|root| root.key() == item.key())
    }

    pub(crate) fn update_item(
        &mut self,
        item: AnyItem,
        animation: RowAnimation,
    ) -> ControllerResult<Reconciliation> {
        if self.is_root(&item) {
            let summary = self.reload_items(item.children().unwrap_or_default(), animation)?;
            self.root = Some(item);
            return Ok(summary);
        }
        self.last_move = None;
        let prepared = match self.prepare_subtree(item)? {
            SubtreeStep::Skipped => return Ok(Reconciliation::skipped()),
            SubtreeStep::Hidden => return Ok(Reconciliation::default()),
            SubtreeStep::Ready(prepared) => prepared,
        };
        if animation.is_none() {
            return self.apply_subtree_unanimated(prepared);
        }
        let Some(old) = self.subtree_rows(&prepared) else {
            return self.resync();
        };
        let plan = plan_subtree(prepared.section, prepared.range.start, &old, &prepared.rows);
        Ok(self.apply_subtree(prepared, plan, animation))
    }

    /// Rows `prepared` is about to replace, or `None` if the flat list no
    /// longer covers them.
    pub(crate) fn subtree_rows(&self, prepared: &PreparedSubtree) -> Option<Vec<AnyItem>> {
        self.rows
            .section(prepared.section)?
            .get(prepared.range.clone())
            .map(<[AnyItem]>::to_vec)
    }

    /// Replace the tracked node's item and project its fresh rows, keeping
    /// every offset and count above it current.
    pub(crate) fn prepare_subtree(&mut self, item: AnyItem) -> ControllerResult<SubtreeStep> {
        if !self.loaded {
            debug!("update before first load ignored");
            return Ok(SubtreeStep::Skipped);
        }
        let Some(id) = self.arena.lookup_item(&item).filter(|&id| self.arena.is_attached(id)) else {
            debug!(key = ?item.key(), "update of untracked item ignored");
            return Ok(SubtreeStep::Skipped);
        };
        let policy = self.delegate.as_ref();

        if !self.arena.is_visible(id) {
            let before = self.arena.row_contribution(id, policy)?;
            let after = self.arena.subtree_pass(id, |arena| {
                arena.set_item(id, item, policy)?;
                arena.row_contribution(id, policy)
            })?;
            self.arena.adjust_row_count(id, after as isize - before as isize)?;
            debug!(?id, before, after, "hidden subtree updated");
            return Ok(SubtreeStep::Hidden);
        }

        let path = self
            .arena
            .index_path(id)
            .ok_or_else(|| ControllerError::ItemNotFound(format!("{:?}", item.key())))?;
        let old_len = self.arena.row_contribution(id, policy)?;

        let rows = self.arena.subtree_pass(id, |arena| -> ControllerResult<_> {
            arena.set_item(id, item, policy)?;
            let mut rows = Vec::new();
            arena.flatten_into(id, &mut rows, policy)?;
            Ok(rows)
        })?;
        self.arena
            .adjust_row_count(id, rows.len() as isize - old_len as isize)?;

        Ok(SubtreeStep::Ready(PreparedSubtree {
            section: path.section,
            range: path.row..path.row + old_len,
            rows,
        }))
    }

    fn splice_subtree(&mut self, prepared: PreparedSubtree) -> bool {
        let Some(section) = self.rows.section_mut(prepared.section) else {
            return false;
        };
        if prepared.range.end > section.len() {
            return false;
        }
        section.splice(prepared.range, prepared.rows);
        true
    }

    pub(crate) fn apply_subtree(
        &mut self,
        prepared: PreparedSubtree,
        plan: SubtreePlan,
        animation: RowAnimation,
    ) -> Reconciliation {
        let section = prepared.section;
        if !self.splice_subtree(prepared) {
            warn!(section, "subtree no longer matches the flat rows");
            return self.resync().unwrap_or_else(|err| {
                warn!(%err, "resync failed");
                Reconciliation::full(0)
            });
        }

        let structural = plan.structural_batch(animation);
        if !structural.is_empty() {
            self.view.perform_batch(&structural, &self.rows);
        }
        let reloads = plan.reload_batch(animation);
        if !reloads.is_empty() {
            self.view.perform_batch(&reloads, &self.rows);
        }

        let freed = self.reclaim(&plan.evicted);
        let summary = Reconciliation::from_subtree(&plan, freed);
        debug!(
            section,
            inserted = summary.rows_inserted,
            deleted = summary.rows_deleted,
            moved = summary.rows_moved,
            reloaded = summary.rows_reloaded,
            freed,
            "subtree applied"
        );
        summary
    }

    pub(crate) fn apply_subtree_unanimated(
        &mut self,
        prepared: PreparedSubtree,
    ) -> ControllerResult<Reconciliation> {
        if !self.splice_subtree(prepared) {
            return self.resync();
        }
        let freed = self.arena.sweep(&self.sections);
        self.view.reload_data(&self.rows);
        Ok(Reconciliation::full(freed))
    }

    /// Rebuild every offset, count and row from the section roots and reload
    /// the view. Used when the flat rows can no longer be patched.
    pub(crate) fn resync(&mut self) -> ControllerResult<Reconciliation> {
        let policy = self.delegate.as_ref();
        let sections = &self.sections;
        let rows = self.arena.reload_pass(|arena| -> ControllerResult<_> {
            let mut rows = Vec::with_capacity(sections.len());
            for (section, &id) in sections.iter().enumerate() {
                let item = arena
                    .get(id)
                    .map(|node| node.item().clone())
                    .ok_or(treeline_tree::TreeError::StaleNode(id))?;
                arena.install_root(id, section)?;
                arena.set_item(id, item, policy)?;
                let mut out = Vec::new();
                arena.flatten_into(id, &mut out, policy)?;
                rows.push(out);
            }
            Ok(rows)
        })?;
        self.rows = Rows::new(rows);
        let freed = self.arena.sweep(&self.sections);
        self.view.reload_data(&self.rows);
        warn!(rows = self.rows.total(), "rows resynchronized");
        Ok(Reconciliation::full(freed))
    }

    // -----------------------------------------------------------------------
    // Expand and collapse
    // -----------------------------------------------------------------------

    /// Flip the expansion of the expandable row at `index_path`. Returns the
    /// new state, or `None` if the row is not expandable.
    pub(crate) fn toggle_row(&mut self, index_path: IndexPath) -> ControllerResult<Option<bool>> {
        let item = self
            .rows
            .get(index_path)
            .cloned()
            .ok_or(ControllerError::RowOutOfBounds(index_path))?;
        let id = self.node_of(&item)?;
        let Some(node) = self.arena.get(id) else {
            return Err(treeline_tree::TreeError::StaleNode(id).into());
        };
        if !node.is_expandable() {
            return Ok(None);
        }
        let expand = !node.is_expanded();
        self.last_move = None;
        if expand {
            self.expand_row(id, index_path)?;
            self.delegate.did_expand(&item);
        } else {
            self.collapse_row(id, index_path)?;
            self.delegate.did_collapse(&item);
        }
        Ok(Some(expand))
    }

    fn expand_row(&mut self, id: NodeId, index_path: IndexPath) -> ControllerResult<Range<usize>> {
        let policy = self.delegate.as_ref();
        self.arena.set_expanded(id, true)?;
        let mut fresh = Vec::new();
        self.arena.flatten_into(id, &mut fresh, policy)?;
        let added = fresh.len().saturating_sub(1);
        self.arena.adjust_row_count(id, added as isize)?;

        let row = index_path.row;
        let section = self
            .rows
            .section_mut(index_path.section)
            .filter(|rows| row < rows.len())
            .ok_or(ControllerError::RowOutOfBounds(index_path))?;
        section.splice(row..=row, fresh);

        let range = row + 1..row + 1 + added;
        let mut batch = crate::view::ViewBatch::new();
        batch.insert_rows(
            range.clone().map(|r| IndexPath::new(index_path.section, r)).collect(),
            self.config.expand_collapse,
        );
        if !batch.is_empty() {
            self.view.perform_batch(&batch, &self.rows);
        }
        debug!(%index_path, added, "expanded");
        Ok(range)
    }

    fn collapse_row(&mut self, id: NodeId, index_path: IndexPath) -> ControllerResult<Range<usize>> {
        let policy = self.delegate.as_ref();
        let hidden = self.arena.number_of_children(id, policy)?;
        let row = index_path.row;
        let range = row + 1..row + 1 + hidden;
        let section = self
            .rows
            .section_mut(index_path.section)
            .filter(|rows| range.end <= rows.len())
            .ok_or(ControllerError::RowOutOfBounds(index_path))?;
        section.drain(range.clone());

        self.arena.set_expanded(id, false)?;
        self.arena.adjust_row_count(id, -(hidden as isize))?;

        let mut batch = crate::view::ViewBatch::new();
        batch.delete_rows(
            range.clone().map(|r| IndexPath::new(index_path.section, r)).collect(),
            self.config.expand_collapse,
        );
        if !batch.is_empty() {
            self.view.perform_batch(&batch, &self.rows);
        }
        debug!(%index_path, hidden, "collapsed");
        Ok(range)
    }

    /// Expand or collapse `item` programmatically. Returns `true` if its
    /// state changed. Items under a collapsed ancestor change state without
    /// touching the view.
    pub fn set_item_expanded<T: TreeItem>(
        &mut self,
        item: &T,
        expanded: bool,
    ) -> ControllerResult<bool> {
        self.ensure_ready()?;
        let key = key_of(item);
        let id = self
            .arena
            .lookup(&key)
            .ok_or_else(|| ControllerError::ItemNotFound(format!("{key:?}")))?;
        let Some(node) = self.arena.get(id) else {
            return Ok(false);
        };
        if !node.is_expandable() || node.is_expanded() == expanded {
            return Ok(false);
        }
        let item = node.item().clone();
        self.last_move = None;

        if self.arena.is_visible(id) {
            let index_path = self
                .arena
                .index_path(id)
                .ok_or_else(|| ControllerError::ItemNotFound(format!("{key:?}")))?;
            if expanded {
                self.expand_row(id, index_path)?;
            } else {
                self.collapse_row(id, index_path)?;
            }
        } else {
            let policy = self.delegate.as_ref();
            let before = self.arena.number_of_children(id, policy)?;
            self.arena.set_expanded(id, expanded)?;
            let after = self.arena.number_of_children(id, policy)?;
            self.arena.adjust_row_count(id, after as isize - before as isize)?;
        }

        if expanded {
            self.delegate.did_expand(&item);
        } else {
            self.delegate.did_collapse(&item);
        }
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Caller queries
    // -----------------------------------------------------------------------

    pub(crate) fn node_of(&self, item: &AnyItem) -> ControllerResult<NodeId> {
        self.arena
            .lookup_item(item)
            .ok_or_else(|| ControllerError::ItemNotFound(format!("{:?}", item.key())))
    }

    fn visible_node<T: TreeItem>(&self, item: &T) -> Option<NodeId> {
        let id = self.arena.lookup(&key_of(item))?;
        let node = self.arena.get(id)?;
        (node.is_rendered() && self.arena.is_visible(id)).then_some(id)
    }

    /// Row currently showing `item`, if it is on screen.
    pub fn index_path<T: TreeItem>(&self, item: &T) -> Option<IndexPath> {
        if self.background.is_busy() {
            let key = key_of(item);
            return self
                .rows
                .iter()
                .find_map(|(index_path, row)| (row.key() == key).then_some(index_path));
        }
        self.arena.index_path(self.visible_node(item)?)
    }

    /// Whether `item` is expanded. During a background job only items on
    /// screen are answered.
    pub fn is_item_expanded<T: TreeItem>(&self, item: &T) -> bool {
        if self.background.is_busy() {
            return self
                .index_path(item)
                .and_then(|index_path| self.row_state(index_path))
                .and_then(|state| state.expanded)
                .unwrap_or(false);
        }
        self.arena
            .lookup(&key_of(item))
            .and_then(|id| self.arena.get(id))
            .is_some_and(|node| node.is_expanded())
    }

    /// Number of rendered ancestors of `item`; zero if untracked.
    pub fn indentation_level<T: TreeItem>(&self, item: &T) -> usize {
        if self.background.is_busy() {
            return self
                .index_path(item)
                .and_then(|index_path| self.row_state(index_path))
                .map_or(0, |state| state.indentation);
        }
        self.arena
            .lookup(&key_of(item))
            .map_or(0, |id| self.arena.indentation_level(id))
    }

    pub fn item_at(&self, index_path: IndexPath) -> Option<&AnyItem> {
        self.rows.get(index_path)
    }

    /// The on-screen cell showing `item`.
    pub fn cell<T: TreeItem>(&self, item: &T) -> Option<&V::Cell> {
        self.view.visible_cell(self.index_path(item)?)
    }

    pub fn select_cell<T: TreeItem>(&mut self, item: &T) -> bool {
        let Some(index_path) = self.index_path(item) else {
            return false;
        };
        self.view.select_row(index_path);
        true
    }

    pub fn deselect_cell<T: TreeItem>(&mut self, item: &T) -> bool {
        let Some(index_path) = self.index_path(item) else {
            return false;
        };
        self.view.deselect_row(index_path);
        true
    }

    pub fn selected_items(&self) -> Vec<AnyItem> {
        self.view
            .selected_rows()
            .into_iter()
            .filter_map(|path| self.rows.get(path).cloned())
            .collect()
    }

    /// Redraw the row of `item` without touching the tree. Returns `false`
    /// if the item is not on screen.
    ///
    /// The cell template is re-resolved from the tracked item; if the
    /// delegate no longer renders it, the previous template is kept.
    pub fn reload_row<T: TreeItem>(
        &mut self,
        item: &T,
        animation: treeline_types::AnimationStyle,
    ) -> ControllerResult<bool> {
        self.ensure_idle()?;
        let Some(id) = self.visible_node(item) else {
            return Ok(false);
        };
        let (Some(index_path), Some(node)) = (self.arena.index_path(id), self.arena.get(id)) else {
            return Ok(false);
        };
        match self.delegate.cell_identifier(node.item()) {
            Some(identifier) => self.arena.set_cell_identifier(id, identifier)?,
            None => warn!(%index_path, "reloaded row lost its cell identifier; keeping the old one"),
        }
        let mut batch = crate::view::ViewBatch::new();
        batch.reload_rows(vec![index_path], animation);
        self.view.perform_batch(&batch, &self.rows);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::*;
    use crate::view::ViewCommand;
    use proptest::prelude::*;
    use treeline_types::AnimationStyle;

    #[test]
    fn update_appends_and_reload_adds_section() {
        let mut data = vec![node("A", vec![leaf("A1"), leaf("A2"), leaf("A3")])];
        let mut c = controller(Delegate::new());
        let summary = c.reload_data(&data, RowAnimation::NONE).unwrap();
        assert!(summary.full_reload);
        assert_eq!(c.number_of_sections(), 1);
        assert_eq!(c.number_of_rows(0), 4);

        data[0].children.as_mut().unwrap().push(leaf("A4"));
        let summary = c.update_contents_of(&data[0], RowAnimation::FADE).unwrap();
        assert_eq!(summary.rows_inserted, 1);
        assert_eq!(summary.rows_reloaded, 1);
        assert_eq!(section_texts(&c, 0), ["A", "A1", "A2", "A3", "A4"]);
        assert_consistent(&c);

        data.push(leaf("B"));
        let summary = c.reload_data(&data, RowAnimation::FADE).unwrap();
        assert_eq!(summary.sections_inserted, 1);
        assert_eq!(c.number_of_sections(), 2);
        assert_eq!(c.number_of_rows(0), 5);
        assert_eq!(c.number_of_rows(1), 1);
        assert_eq!(texts(&c), ["A", "A1", "A2", "A3", "A4", "B"]);
        assert_consistent(&c);
    }

    #[test]
    fn updates_through_hidden_sections() {
        let mut data = vec![
            node("A", vec![leaf("A1"), leaf("A2"), leaf("A3")]).hidden(),
            node("B", vec![leaf("B1")]).hidden(),
        ];
        let mut c = controller(Delegate::new());
        c.reload_data(&data, RowAnimation::NONE).unwrap();
        assert_eq!(texts(&c), ["A1", "A2", "A3", "B1"]);

        data[0].child_mut(0).children = Some(vec![leaf("A1_1"), leaf("A1_2")]);
        c.update_contents_of(&data[0], RowAnimation::FADE).unwrap();
        assert_eq!(texts(&c), ["A1", "A1_1", "A1_2", "A2", "A3", "B1"]);
        assert_consistent(&c);

        data[0].child_mut(0).children = Some(vec![leaf("A1_3"), leaf("A1_2"), leaf("A1_1")]);
        let summary = c.update_contents_of(data[0].child(0), RowAnimation::FADE).unwrap();
        assert_eq!(summary.rows_inserted, 1);
        assert_eq!(summary.rows_moved, 2);
        assert_eq!(summary.rows_reloaded, 1);
        assert_eq!(texts(&c), ["A1", "A1_3", "A1_2", "A1_1", "A2", "A3", "B1"]);
        assert_consistent(&c);

        data[0].child_mut(0).children = Some(vec![leaf("A1_1"), leaf("A1_2")]);
        data[1].child_mut(0).children = Some(vec![leaf("A1_3")]);
        c.reload_data(&data, RowAnimation::FADE).unwrap();
        assert_eq!(texts(&c), ["A1", "A1_1", "A1_2", "A2", "A3", "B1", "A1_3"]);
        assert_eq!(c.indentation_level(&leaf("A1_3")), 1);
        assert_consistent(&c);

        data[1].child_mut(0).children = Some(vec![]);
        let summary = c.update_contents_of(&data[1], RowAnimation::FADE).unwrap();
        assert_eq!(summary.rows_deleted, 1);
        assert!(summary.nodes_freed >= 1);
        assert_eq!(texts(&c), ["A1", "A1_1", "A1_2", "A2", "A3", "B1"]);
        assert!(c.index_path(&leaf("A1_3")).is_none());
        assert_consistent(&c);
    }

    #[test]
    fn selecting_a_collapsed_row_expands_it() {
        let data = vec![
            node("A", vec![leaf("A1"), leaf("A2"), leaf("A3")]).collapsed(),
            node("B", vec![leaf("B1")]),
        ];
        let delegate = Delegate::new();
        let events = delegate.events.clone();
        let mut c = controller(delegate);
        c.reload_data(&data, RowAnimation::NONE).unwrap();
        assert_eq!(texts(&c), ["A", "B", "B1"]);
        assert!(!c.is_item_expanded(&data[0]));

        c.did_select_row(ip(0, 0)).unwrap();
        assert_eq!(texts(&c), ["A", "A1", "A2", "A3", "B", "B1"]);
        assert!(c.is_item_expanded(&data[0]));
        assert_eq!(
            c.view().commands().last(),
            Some(&ViewCommand::InsertRows {
                rows: vec![ip(0, 1), ip(0, 2), ip(0, 3)],
                animation: AnimationStyle::Fade,
            })
        );
        assert_consistent(&c);

        c.did_select_row(ip(0, 0)).unwrap();
        assert_eq!(texts(&c), ["A", "B", "B1"]);
        assert_eq!(
            c.view().commands().last(),
            Some(&ViewCommand::DeleteRows {
                rows: vec![ip(0, 1), ip(0, 2), ip(0, 3)],
                animation: AnimationStyle::Fade,
            })
        );
        assert_consistent(&c);
        assert_eq!(
            *events.lock().unwrap(),
            ["expand A", "select A", "collapse A", "select A"]
        );
    }

    #[test]
    fn expansion_survives_content_updates() {
        let data = vec![node(
            "A",
            vec![
                node("A1", vec![leaf("A1_1")]),
                node("A2", vec![leaf("A2_1")]).collapsed(),
            ],
        )];
        let mut c = controller(Delegate::new());
        c.reload_data(&data, RowAnimation::NONE).unwrap();
        assert_eq!(texts(&c), ["A", "A1", "A1_1", "A2"]);

        c.did_select_row(ip(0, 3)).unwrap();
        assert_eq!(texts(&c), ["A", "A1", "A1_1", "A2", "A2_1"]);

        c.update_contents_of(&data[0], RowAnimation::NONE).unwrap();
        assert_eq!(texts(&c), ["A", "A1", "A1_1", "A2", "A2_1"]);
        assert_consistent(&c);
    }

    #[test]
    fn unanimated_reload_forgets_expansion() {
        let data = vec![node("A", vec![leaf("A1")]).collapsed()];
        let mut c = controller(Delegate::new());
        c.reload_data(&data, RowAnimation::NONE).unwrap();
        c.did_select_row(ip(0, 0)).unwrap();
        assert_eq!(texts(&c), ["A", "A1"]);

        let summary = c.reload_data(&data, RowAnimation::FADE).unwrap();
        assert!(summary.is_noop());
        assert_eq!(texts(&c), ["A", "A1"]);

        c.reload_data(&data, RowAnimation::NONE).unwrap();
        assert_eq!(texts(&c), ["A"]);
        assert_eq!(c.view().full_reloads(), 2);
        assert_consistent(&c);
    }

    #[test]
    fn selection_while_editing_does_not_toggle() {
        let data = vec![node("A", vec![leaf("A1")])];
        let delegate = Delegate::new();
        let events = delegate.events.clone();
        let mut c = controller(delegate);
        c.reload_data(&data, RowAnimation::NONE).unwrap();
        c.view_mut().set_editing(true);

        c.did_select_row(ip(0, 0)).unwrap();
        assert_eq!(texts(&c), ["A", "A1"]);
        assert_eq!(*events.lock().unwrap(), ["select A"]);
    }

    #[test]
    fn hidden_updates_adjust_counts_without_rows() {
        let mut data = vec![node(
            "A",
            vec![node("A1", vec![leaf("A1_1"), leaf("A1_2")]), leaf("A2")],
        )];
        let mut c = controller(Delegate::new());
        c.reload_data(&data, RowAnimation::NONE).unwrap();
        c.did_select_row(ip(0, 1)).unwrap();
        assert_eq!(texts(&c), ["A", "A1", "A2"]);

        data[0].child_mut(0).child_mut(0).children = Some(vec![leaf("X")]);
        let batches = c.view().batches();
        let summary = c
            .update_contents_of(data[0].child(0).child(0), RowAnimation::FADE)
            .unwrap();
        assert!(summary.is_noop());
        assert!(!summary.skipped);
        assert_eq!(c.view().batches(), batches);
        assert_eq!(c.index_path(&leaf("A2")), Some(ip(0, 2)));

        c.did_select_row(ip(0, 1)).unwrap();
        assert_eq!(texts(&c), ["A", "A1", "A1_1", "X", "A1_2", "A2"]);
        assert_consistent(&c);
    }

    #[test]
    fn updating_the_root_reloads_everything() {
        let mut root = node("root", vec![node("A", vec![leaf("A1")])]);
        let mut c = controller(Delegate::new());
        c.reload_data_from(&root, RowAnimation::NONE).unwrap();
        assert_eq!(texts(&c), ["A", "A1"]);

        root.children.as_mut().unwrap().push(leaf("B"));
        let summary = c.update_contents_of(&root, RowAnimation::FADE).unwrap();
        assert_eq!(summary.sections_inserted, 1);
        assert_eq!(texts(&c), ["A", "A1", "B"]);
        assert_eq!(c.root().map(crate::fixtures::text).as_deref(), Some("root"));
        assert_consistent(&c);

        c.reload_data(&[leaf("Z")], RowAnimation::FADE).unwrap();
        assert!(c.root().is_none());
        assert_eq!(texts(&c), ["Z"]);
        assert_consistent(&c);
    }

    #[test]
    fn untracked_updates_are_skipped() {
        let mut c = controller(Delegate::new());
        assert!(c.update_contents_of(&leaf("A"), RowAnimation::FADE).unwrap().skipped);

        c.reload_data(&[leaf("A")], RowAnimation::NONE).unwrap();
        let summary = c.update_contents_of(&leaf("nope"), RowAnimation::FADE).unwrap();
        assert!(summary.skipped);
        assert_eq!(c.view().batches(), 0);
    }

    #[test]
    fn programmatic_expansion() {
        let data = vec![node("A", vec![node("A1", vec![leaf("A1_1")]).collapsed()])];
        let delegate = Delegate::new();
        let events = delegate.events.clone();
        let mut c = controller(delegate);
        c.reload_data(&data, RowAnimation::NONE).unwrap();
        assert_eq!(texts(&c), ["A", "A1"]);

        assert!(c.set_item_expanded(data[0].child(0), true).unwrap());
        assert!(!c.set_item_expanded(data[0].child(0), true).unwrap());
        assert_eq!(texts(&c), ["A", "A1", "A1_1"]);

        assert!(c.set_item_expanded(&data[0], false).unwrap());
        assert_eq!(texts(&c), ["A"]);

        // A1 is hidden under the collapsed A.
        assert!(c.set_item_expanded(data[0].child(0), false).unwrap());
        assert_eq!(texts(&c), ["A"]);

        assert!(c.set_item_expanded(&data[0], true).unwrap());
        assert_eq!(texts(&c), ["A", "A1"]);
        assert_consistent(&c);
        assert_eq!(
            *events.lock().unwrap(),
            ["expand A1", "collapse A", "collapse A1", "expand A"]
        );
        assert!(matches!(
            c.set_item_expanded(&leaf("nope"), true),
            Err(ControllerError::ItemNotFound(_))
        ));
    }

    #[test]
    fn reload_row_redraws_in_place() {
        let data = vec![node("A", vec![leaf("A1")])];
        let mut c = controller(Delegate::new());
        c.reload_data(&data, RowAnimation::NONE).unwrap();

        assert!(c.reload_row(&leaf("A1"), AnimationStyle::Fade).unwrap());
        assert_eq!(
            c.view().commands(),
            [ViewCommand::ReloadRows {
                rows: vec![ip(0, 1)],
                animation: AnimationStyle::Fade,
            }]
        );
        assert!(!c.reload_row(&leaf("nope"), AnimationStyle::Fade).unwrap());
        assert_consistent(&c);
    }

    #[test]
    fn selection_helpers_map_items_to_rows() {
        let data = vec![node("A", vec![leaf("A1"), leaf("A2")])];
        let mut c = controller(Delegate::new());
        c.reload_data(&data, RowAnimation::NONE).unwrap();

        assert!(c.select_cell(&leaf("A2")));
        assert!(!c.select_cell(&leaf("nope")));
        let selected: Vec<String> = c.selected_items().iter().map(text).collect();
        assert_eq!(selected, ["A2"]);
        assert!(c.deselect_cell(&leaf("A2")));
        assert!(c.selected_items().is_empty());
        assert!(c.cell(&leaf("A1")).is_none());
        assert_eq!(c.item_at(ip(0, 2)).map(text).as_deref(), Some("A2"));
    }

    #[test]
    fn repeated_identifiers_across_sections_keep_rows_consistent() {
        let branch = || node("X", vec![leaf("X1")]);
        let mut data = vec![node("A", vec![branch(), leaf("A2")]), node("B", vec![branch()])];
        let mut c = controller(Delegate::new());
        c.reload_data(&data, RowAnimation::NONE).unwrap();
        assert_eq!(texts(&c), ["A", "X", "X1", "A2", "B", "X", "X1"]);

        c.did_select_row(ip(0, 1)).unwrap();
        assert_eq!(texts(&c), ["A", "X", "A2", "B", "X", "X1"]);
        assert_eq!(c.index_path(&leaf("A2")), Some(ip(0, 2)));

        data[0].children.as_mut().unwrap().push(leaf("A3"));
        c.update_contents_of(&data[0], RowAnimation::FADE).unwrap();
        assert_eq!(texts(&c), ["A", "X", "A2", "A3", "B", "X", "X1"]);
        assert_eq!(c.index_path(&branch()), Some(ip(0, 1)));
        assert_eq!(c.index_path(&leaf("A3")), Some(ip(0, 3)));

        assert!(c.reload_data(&data, RowAnimation::FADE).unwrap().is_noop());
        assert!(c.view().inconsistencies().is_empty());
        assert_eq!(c.view().mirror(), c.rows().sections());
    }

    /// Every node reachable from the section roots with its cached
    /// position and row count, in depth-first order.
    fn layout(c: &Controller) -> Vec<(NodeId, usize, usize, Option<usize>)> {
        fn walk(
            arena: &NodeArena,
            id: NodeId,
            out: &mut Vec<(NodeId, usize, usize, Option<usize>)>,
        ) {
            let Some(node) = arena.get(id) else { return };
            out.push((id, node.offset(), node.index(), node.cached_number_of_children()));
            for &child in node.materialized_children().unwrap_or_default() {
                walk(arena, child, out);
            }
        }
        let mut out = Vec::new();
        for &root in &c.sections {
            walk(c.arena(), root, &mut out);
        }
        out
    }

    fn outline(shape: &[Vec<usize>]) -> Vec<Item> {
        shape
            .iter()
            .enumerate()
            .map(|(i, children)| {
                let name = format!("S{i}");
                let children = children
                    .iter()
                    .enumerate()
                    .map(|(j, &n)| {
                        let child = format!("{name}_{j}");
                        node(&child, (0..n).map(|k| leaf(&format!("{child}_{k}"))).collect())
                    })
                    .collect();
                node(&name, children)
            })
            .collect()
    }

    fn shapes() -> impl Strategy<Value = Vec<Vec<usize>>> {
        prop::collection::vec(prop::collection::vec(0usize..3, 0..4), 1..4)
    }

    proptest! {
        #[test]
        fn collapse_then_expand_restores_rows(shape in shapes(), pick in any::<prop::sample::Index>()) {
            let mut c = controller(Delegate::new());
            c.reload_data(&outline(&shape), RowAnimation::NONE).unwrap();
            let before = texts(&c);
            let paths: Vec<IndexPath> = c.rows().iter().map(|(path, _)| path).collect();
            let path = paths[pick.index(paths.len())];

            c.did_select_row(path).unwrap();
            assert_consistent(&c);
            c.did_select_row(path).unwrap();
            prop_assert_eq!(texts(&c), before);
            assert_consistent(&c);
        }

        #[test]
        fn reloading_identical_content_changes_nothing(shape in shapes()) {
            let data = outline(&shape);
            let mut c = controller(Delegate::new());
            c.reload_data(&data, RowAnimation::NONE).unwrap();
            let live = c.arena().len();
            let before = layout(&c);
            let commands = c.view().commands().len();

            let summary = c.reload_data(&data, RowAnimation::FADE).unwrap();
            prop_assert!(summary.is_noop());
            prop_assert_eq!(c.view().commands().len(), commands);
            prop_assert_eq!(c.arena().len(), live);
            prop_assert_eq!(before.len(), live);
            prop_assert_eq!(layout(&c), before);
            assert_consistent(&c);
        }
    }
}
