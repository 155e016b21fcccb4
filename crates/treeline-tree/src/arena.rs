//! Generational node arena with an identity map.
//!
//! Nodes are created lazily as the flattened view asks for them. Parent links
//! and identity-map entries are plain handles; the only ownership edges are
//! the section roots the caller holds and each node's materialized children.
//! Nodes that fall out of the tree stay allocated until [`NodeArena::evict`]
//! or [`NodeArena::sweep`] reclaims them, so a subtree that reappears within
//! the same reconciliation keeps its expansion state.
//!
//! A node has at most one place in the tree. Rebuilding children inside a
//! [`NodeArena::reload_pass`] or [`NodeArena::subtree_pass`] may move a node
//! away from a parent that the same pass is about to rebuild; anywhere else,
//! an identifier that is already placed gets an unmapped copy instead.

use std::collections::{HashMap, HashSet};

use tracing::{debug, trace, warn};
use treeline_types::IndexPath;

use crate::error::{TreeError, TreeResult};
use crate::item::AnyItem;
use crate::key::DiffKey;
use crate::node::{Node, NodeFlags, NodeId};
use crate::policy::NodePolicy;

struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Which placed nodes the current pass may move to a new parent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum Scope {
    /// No pass is running.
    #[default]
    Settled,
    /// Every section is being rebuilt.
    Everything,
    /// Only the subtree at this node is being rebuilt.
    Within(NodeId),
}

/// Storage for every tracked node plus the identity map.
#[derive(Default)]
pub struct NodeArena {
    slots: Vec<Slot>,
    free_list: Vec<usize>,
    identity: HashMap<DiffKey, NodeId>,
    pass: u64,
    scope: Scope,
}

impl std::fmt::Debug for NodeArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeArena")
            .field("live", &self.len())
            .field("free_list", &self.free_list.len())
            .field("identity", &self.identity.len())
            .field("pass", &self.pass)
            .finish()
    }
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of identity-map entries.
    pub fn tracked(&self) -> usize {
        self.identity.len()
    }

    // -----------------------------------------------------------------------
    // Access
    // -----------------------------------------------------------------------

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        let slot = self.slots.get(id.idx())?;
        if slot.generation != id.generation() {
            return None;
        }
        slot.node.as_ref()
    }

    fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let slot = self.slots.get_mut(id.idx())?;
        if slot.generation != id.generation() {
            return None;
        }
        slot.node.as_mut()
    }

    fn node(&self, id: NodeId) -> TreeResult<&Node> {
        self.get(id).ok_or(TreeError::StaleNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> TreeResult<&mut Node> {
        self.get_mut(id).ok_or(TreeError::StaleNode(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Live node currently tracking `key`.
    pub fn lookup(&self, key: &DiffKey) -> Option<NodeId> {
        let id = *self.identity.get(key)?;
        self.contains(id).then_some(id)
    }

    /// Live node currently tracking `item`'s identity.
    pub fn lookup_item(&self, item: &AnyItem) -> Option<NodeId> {
        self.lookup(&item.key())
    }

    // -----------------------------------------------------------------------
    // Allocation
    // -----------------------------------------------------------------------

    fn alloc<P: NodePolicy + ?Sized>(&mut self, item: AnyItem, policy: &P) -> NodeId {
        let cell_identifier = policy.cell_identifier(&item);
        let flags = if cell_identifier.is_none() {
            NodeFlags::EXPANDED
        } else if policy.is_expandable(&item) {
            if policy.is_expanded(&item) {
                NodeFlags::EXPANDABLE | NodeFlags::EXPANDED
            } else {
                NodeFlags::EXPANDABLE
            }
        } else {
            NodeFlags::EXPANDED
        };
        let node = Node::new(item, cell_identifier, flags);

        if let Some(idx) = self.free_list.pop() {
            let slot = &mut self.slots[idx];
            slot.node = Some(node);
            NodeId::new(idx as u32, slot.generation)
        } else {
            self.slots.push(Slot {
                generation: 1,
                node: Some(node),
            });
            NodeId::new((self.slots.len() - 1) as u32, 1)
        }
    }

    fn free(&mut self, id: NodeId) -> Option<Node> {
        let slot = self.slots.get_mut(id.idx())?;
        if slot.generation != id.generation() {
            return None;
        }
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(id.idx());
        let key = node.item.key();
        if self.identity.get(&key) == Some(&id) {
            self.identity.remove(&key);
        }
        Some(node)
    }

    /// Node tracking `item`'s identity, created from `policy` if none exists.
    ///
    /// An existing node keeps its current item; see [`NodeArena::materialize`].
    pub fn node_for<P: NodePolicy + ?Sized>(&mut self, item: &AnyItem, policy: &P) -> NodeId {
        let key = item.key();
        if let Some(id) = self.lookup(&key) {
            return id;
        }
        let id = self.alloc(item.clone(), policy);
        self.identity.insert(key, id);
        trace!(?id, "node created");
        id
    }

    /// Node tracking `item`'s identity, refreshed to hold `item`, for use as
    /// a section root.
    ///
    /// Within a pass, an identifier already placed by that pass gets an
    /// unmapped copy.
    pub fn materialize<P: NodePolicy + ?Sized>(
        &mut self,
        item: &AnyItem,
        policy: &P,
    ) -> TreeResult<NodeId> {
        let id = match self.lookup_item(item) {
            None => self.node_for(item, policy),
            Some(found) if self.placed_this_pass(found) => {
                warn!(key = ?item.key(), "section identifier already placed; tracking an unmapped copy");
                self.alloc(item.clone(), policy)
            }
            Some(found) => found,
        };
        let pass = self.pass;
        self.node_mut(id)?.claimed = pass;
        self.set_item(id, item.clone(), policy)?;
        Ok(id)
    }

    /// Turn `id` into the root of `section`.
    pub fn install_root(&mut self, id: NodeId, section: usize) -> TreeResult<()> {
        let pass = self.pass;
        let node = self.node_mut(id)?;
        node.parent = None;
        node.section = Some(section);
        node.offset = 0;
        node.index = section;
        node.claimed = pass;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Materialization passes
    // -----------------------------------------------------------------------

    /// Run `f` as a pass that rebuilds every section. Placed nodes may move
    /// to a new parent until the pass places them.
    pub fn reload_pass<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.run_pass(Scope::Everything, f)
    }

    /// Run `f` as a pass that rebuilds the subtree at `root`. Only nodes held
    /// inside that subtree may move to a new parent.
    pub fn subtree_pass<R>(&mut self, root: NodeId, f: impl FnOnce(&mut Self) -> R) -> R {
        self.run_pass(Scope::Within(root), f)
    }

    fn run_pass<R>(&mut self, scope: Scope, f: impl FnOnce(&mut Self) -> R) -> R {
        self.pass += 1;
        self.scope = scope;
        let result = f(self);
        self.scope = Scope::Settled;
        result
    }

    fn placed_this_pass(&self, id: NodeId) -> bool {
        self.scope != Scope::Settled && self.get(id).is_some_and(|n| n.claimed == self.pass)
    }

    /// Whether `id` may become a child of `parent` without another parent or
    /// section still holding it.
    fn may_claim(&self, id: NodeId, parent: NodeId) -> bool {
        let Some(node) = self.get(id) else {
            return false;
        };
        let holder = match node.parent {
            Some(p) if p == parent => return true,
            Some(p) => {
                let held = self
                    .get(p)
                    .and_then(|h| h.children.as_deref())
                    .is_some_and(|c| c.contains(&id));
                if !held {
                    return true;
                }
                Some(p)
            }
            None if node.section.is_some() => None,
            None => return true,
        };
        if self.placed_this_pass(id) {
            return false;
        }
        match (self.scope, holder) {
            (Scope::Everything, _) => true,
            (Scope::Within(root), Some(holder)) => self.is_descendant(holder, root),
            _ => false,
        }
    }

    /// Forget that `id` is a section root.
    pub fn uninstall_root(&mut self, id: NodeId) {
        if let Some(node) = self.get_mut(id) {
            if node.parent.is_none() {
                node.section = None;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Item replacement and lazy children
    // -----------------------------------------------------------------------

    /// Replace the node's item.
    ///
    /// Invalidates the memoized row count. If children were already
    /// materialized they are rebuilt from the new item, reusing existing nodes
    /// by identity so their expansion state survives.
    pub fn set_item<P: NodePolicy + ?Sized>(
        &mut self,
        id: NodeId,
        item: AnyItem,
        policy: &P,
    ) -> TreeResult<()> {
        let node = self.node_mut(id)?;
        node.item = item;
        node.number_of_children = None;
        if node.children.is_some() {
            self.build_children(id, policy)?;
        }
        Ok(())
    }

    fn build_children<P: NodePolicy + ?Sized>(&mut self, id: NodeId, policy: &P) -> TreeResult<()> {
        let items = self.node(id)?.item.children().unwrap_or_default();
        let previous = self.node_mut(id)?.children.take().unwrap_or_default();

        let mut ids = Vec::with_capacity(items.len());
        let mut claimed = HashSet::with_capacity(items.len());
        let mut offset = 0;
        for item in items {
            let child = self.claim_child(id, &item, &previous, &claimed, policy);
            claimed.insert(child);
            {
                let pass = self.pass;
                let node = self.node_mut(child)?;
                node.parent = Some(id);
                node.section = None;
                node.index = ids.len();
                node.claimed = pass;
            }
            self.set_item(child, item, policy)?;
            let contribution = self.row_contribution(child, policy)?;
            self.node_mut(child)?.offset = offset;
            offset += contribution;
            ids.push(child);
        }

        for stale in previous {
            if claimed.contains(&stale) {
                continue;
            }
            if let Some(node) = self.get_mut(stale) {
                if node.parent == Some(id) {
                    node.parent = None;
                }
            }
        }

        self.node_mut(id)?.children = Some(ids);
        Ok(())
    }

    /// Node to place under `parent` for `item`: the tracked node if it is
    /// free to move here, otherwise an unmapped copy, reusing one `parent`
    /// already had so its expansion state survives.
    fn claim_child<P: NodePolicy + ?Sized>(
        &mut self,
        parent: NodeId,
        item: &AnyItem,
        previous: &[NodeId],
        claimed: &HashSet<NodeId>,
        policy: &P,
    ) -> NodeId {
        let key = item.key();
        let Some(found) = self.lookup(&key) else {
            return self.node_for(item, policy);
        };
        if !claimed.contains(&found)
            && !self.is_descendant(parent, found)
            && self.may_claim(found, parent)
        {
            return found;
        }
        let copy = previous.iter().copied().find(|&c| {
            c != found
                && !claimed.contains(&c)
                && self
                    .get(c)
                    .is_some_and(|n| n.parent == Some(parent) && n.item.key() == key)
        });
        if let Some(copy) = copy {
            return copy;
        }
        warn!(?key, "identifier already placed; tracking an unmapped copy");
        self.alloc(item.clone(), policy)
    }

    /// Children of `id`, materializing them on first use.
    pub fn children<P: NodePolicy + ?Sized>(
        &mut self,
        id: NodeId,
        policy: &P,
    ) -> TreeResult<&[NodeId]> {
        if self.node(id)?.children.is_none() {
            self.build_children(id, policy)?;
        }
        Ok(self.node(id)?.children.as_deref().unwrap_or(&[]))
    }

    /// Flattened row count of the subtree below `id`, excluding `id`'s own
    /// row. Zero for a collapsed node.
    pub fn number_of_children<P: NodePolicy + ?Sized>(
        &mut self,
        id: NodeId,
        policy: &P,
    ) -> TreeResult<usize> {
        let node = self.node(id)?;
        if let Some(count) = node.number_of_children {
            return Ok(count);
        }
        let count = if node.shows_children() {
            let children = self.children(id, policy)?.to_vec();
            let mut total = 0;
            for child in children {
                total += self.row_contribution(child, policy)?;
            }
            total
        } else {
            0
        };
        self.node_mut(id)?.number_of_children = Some(count);
        Ok(count)
    }

    /// Rows `id` adds to its parent: its own row, if rendered, plus its
    /// visible descendants.
    pub fn row_contribution<P: NodePolicy + ?Sized>(
        &mut self,
        id: NodeId,
        policy: &P,
    ) -> TreeResult<usize> {
        let node = self.node(id)?;
        let own = usize::from(node.is_rendered());
        let below = if node.shows_children() {
            self.number_of_children(id, policy)?
        } else {
            0
        };
        Ok(own + below)
    }

    /// Depth-first projection: the node's row (if rendered) followed by its
    /// visible descendants.
    pub fn flatten_into<P: NodePolicy + ?Sized>(
        &mut self,
        id: NodeId,
        out: &mut Vec<AnyItem>,
        policy: &P,
    ) -> TreeResult<()> {
        let node = self.node(id)?;
        if node.is_rendered() {
            out.push(node.item.clone());
        }
        if node.shows_children() {
            for child in self.children(id, policy)?.to_vec() {
                self.flatten_into(child, out, policy)?;
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Position queries
    // -----------------------------------------------------------------------

    fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let limit = self.slots.len();
        std::iter::successors(self.get(id).and_then(Node::parent), |&p| {
            self.get(p).and_then(Node::parent)
        })
        .take(limit)
    }

    /// Position of `id` in the flattened rows, computed by summing sibling
    /// offsets up to the section root. Meaningful only while the node is
    /// visible.
    pub fn index_path(&self, id: NodeId) -> Option<IndexPath> {
        let mut current = self.get(id)?;
        let mut row = 0;
        for _ in 0..=self.slots.len() {
            let Some(parent_id) = current.parent else {
                return Some(IndexPath::new(current.section?, row));
            };
            let parent = self.get(parent_id)?;
            row += current.offset + usize::from(parent.is_rendered());
            current = parent;
        }
        None
    }

    /// Section of the root `id` descends from.
    pub fn section_of(&self, id: NodeId) -> Option<usize> {
        let root = self.root_of(id)?;
        self.get(root)?.section
    }

    fn root_of(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?;
        Some(self.ancestors(id).last().unwrap_or(id))
    }

    /// Returns `true` if the node is attached to a section root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        self.section_of(id).is_some()
    }

    /// Returns `true` if the node is attached and no ancestor is collapsed.
    pub fn is_visible(&self, id: NodeId) -> bool {
        self.is_attached(id)
            && self
                .ancestors(id)
                .all(|a| self.get(a).is_some_and(Node::shows_children))
    }

    /// Returns `true` if `id` is `of` or lies below it.
    pub fn is_descendant(&self, id: NodeId, of: NodeId) -> bool {
        id == of || self.ancestors(id).any(|a| a == of)
    }

    /// Number of rendered strict ancestors.
    pub fn indentation_level(&self, id: NodeId) -> usize {
        self.ancestors(id)
            .filter(|&a| self.get(a).is_some_and(Node::is_rendered))
            .count()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.parent
    }

    // -----------------------------------------------------------------------
    // Incremental row accounting
    // -----------------------------------------------------------------------

    /// Propagate a change of `delta` rows inside the subtree at `id`.
    ///
    /// Every later sibling at every level shifts by `delta`, and every
    /// ancestor's memoized count grows by `delta`, up to and including the
    /// first collapsed ancestor's siblings.
    pub fn adjust_row_count(&mut self, id: NodeId, delta: isize) -> TreeResult<()> {
        if delta == 0 {
            return Ok(());
        }
        let mut current = id;
        for _ in 0..=self.slots.len() {
            let node = self.node(current)?;
            let Some(parent) = node.parent else { break };
            let index = node.index;

            let later: Vec<NodeId> = self
                .node(parent)?
                .children
                .as_deref()
                .unwrap_or(&[])
                .iter()
                .skip(index + 1)
                .copied()
                .collect();
            for sibling in later {
                let sibling = self.node_mut(sibling)?;
                sibling.offset = sibling.offset.saturating_add_signed(delta);
            }

            let parent_node = self.node_mut(parent)?;
            if !parent_node.shows_children() {
                break;
            }
            if let Some(count) = parent_node.number_of_children {
                parent_node.number_of_children = Some(count.saturating_add_signed(delta));
            }
            current = parent;
        }
        Ok(())
    }

    /// Set the expansion flag of a rendered node. Returns `false` if nothing
    /// changed. Collapsing pins the row count to zero; expanding leaves it to
    /// be recomputed.
    pub fn set_expanded(&mut self, id: NodeId, expanded: bool) -> TreeResult<bool> {
        let node = self.node_mut(id)?;
        if !node.is_rendered() {
            return Err(TreeError::NotRendered(id));
        }
        if node.is_expanded() == expanded {
            return Ok(false);
        }
        node.flags.set(NodeFlags::EXPANDED, expanded);
        node.number_of_children = if expanded { None } else { Some(0) };
        Ok(true)
    }

    /// Re-resolve the cell template of `id`.
    pub fn set_cell_identifier(&mut self, id: NodeId, cell_identifier: String) -> TreeResult<()> {
        let node = self.node_mut(id)?;
        if !node.is_rendered() {
            return Err(TreeError::NotRendered(id));
        }
        node.cell_identifier = Some(cell_identifier);
        Ok(())
    }

    pub fn set_estimated_row_height(&mut self, id: NodeId, height: f64) -> TreeResult<()> {
        self.node_mut(id)?.estimated_row_height = Some(height);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Reparenting
    // -----------------------------------------------------------------------

    /// Unlink `id` from its parent, shrinking every affected offset and count.
    /// Returns the number of rows the subtree occupied.
    pub fn detach<P: NodePolicy + ?Sized>(&mut self, id: NodeId, policy: &P) -> TreeResult<usize> {
        let parent = self.node(id)?.parent.ok_or(TreeError::NotAttached(id))?;
        let rows = self.row_contribution(id, policy)?;
        self.adjust_row_count(id, -(rows as isize))?;

        let siblings = {
            let list = self
                .node_mut(parent)?
                .children
                .as_mut()
                .ok_or(TreeError::NotAttached(id))?;
            list.retain(|&c| c != id);
            list.clone()
        };
        for (index, sibling) in siblings.into_iter().enumerate() {
            self.node_mut(sibling)?.index = index;
        }

        let node = self.node_mut(id)?;
        node.parent = None;
        node.offset = 0;
        Ok(rows)
    }

    /// Link a detached `id` as child number `index` of `parent`, growing every
    /// affected offset and count. Returns the number of rows the subtree
    /// occupies.
    pub fn attach<P: NodePolicy + ?Sized>(
        &mut self,
        id: NodeId,
        parent: NodeId,
        index: usize,
        policy: &P,
    ) -> TreeResult<usize> {
        if self.is_descendant(parent, id) {
            return Err(TreeError::WouldCycle { node: id, parent });
        }
        let rows = self.row_contribution(id, policy)?;
        let mut siblings = self.children(parent, policy)?.to_vec();
        siblings.retain(|&c| c != id);
        let index = index.min(siblings.len());
        siblings.insert(index, id);

        let offset = match index.checked_sub(1) {
            Some(prev) => {
                let prev = siblings[prev];
                let prev_offset = self.node(prev)?.offset;
                prev_offset + self.row_contribution(prev, policy)?
            }
            None => 0,
        };

        for (i, &sibling) in siblings.iter().enumerate().skip(index) {
            self.node_mut(sibling)?.index = i;
        }
        self.node_mut(parent)?.children = Some(siblings);
        {
            let node = self.node_mut(id)?;
            node.parent = Some(parent);
            node.section = None;
            node.offset = offset;
        }
        self.adjust_row_count(id, rows as isize)?;
        Ok(rows)
    }

    // -----------------------------------------------------------------------
    // Reclamation
    // -----------------------------------------------------------------------

    /// Free the node tracking `key` and its materialized subtree, provided it
    /// is no longer attached to a section root. Returns the number of nodes
    /// freed.
    pub fn evict(&mut self, key: &DiffKey) -> usize {
        let Some(id) = self.lookup(key) else { return 0 };
        if self.is_attached(id) {
            return 0;
        }
        let freed = self.free_subtree(id);
        trace!(?key, freed, "evicted");
        freed
    }

    fn free_subtree(&mut self, id: NodeId) -> usize {
        let mut stack = vec![id];
        let mut freed = 0;
        while let Some(current) = stack.pop() {
            let Some(node) = self.free(current) else { continue };
            freed += 1;
            for child in node.children.unwrap_or_default() {
                if self.get(child).is_some_and(|c| c.parent == Some(current)) {
                    stack.push(child);
                }
            }
        }
        freed
    }

    /// Free every node not reachable from `roots` through materialized
    /// children. Returns the number of nodes freed.
    pub fn sweep(&mut self, roots: &[NodeId]) -> usize {
        let mut reachable = HashSet::new();
        let mut stack: Vec<NodeId> = roots.to_vec();
        while let Some(id) = stack.pop() {
            let Some(node) = self.get(id) else { continue };
            if !reachable.insert(id) {
                continue;
            }
            stack.extend(node.children.as_deref().unwrap_or(&[]));
        }

        let dead: Vec<NodeId> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.node.is_some())
            .map(|(idx, slot)| NodeId::new(idx as u32, slot.generation))
            .filter(|id| !reachable.contains(id))
            .collect();
        for &id in &dead {
            self.free(id);
        }
        self.identity.retain(|_, id| reachable.contains(id));
        if !dead.is_empty() {
            debug!(freed = dead.len(), live = self.len(), "arena sweep");
        }
        dead.len()
    }

    /// Free every node and forget every identity.
    pub fn clear(&mut self) {
        let live: Vec<NodeId> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.node.is_some())
            .map(|(idx, slot)| NodeId::new(idx as u32, slot.generation))
            .collect();
        for id in live {
            self.free(id);
        }
        self.identity.clear();
    }
}
