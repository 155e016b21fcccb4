use std::fmt;

use bitflags::bitflags;

use crate::item::AnyItem;

/// Generational handle of a node in a [`NodeArena`](crate::NodeArena).
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32, u32);

impl NodeId {
    pub(crate) fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    pub(crate) fn idx(self) -> usize {
        self.0 as usize
    }

    pub(crate) fn generation(self) -> u32 {
        self.1
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({}v{})", self.0, self.1)
    }
}

bitflags! {
    /// Expansion state of a node.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct NodeFlags: u8 {
        /// The row can be collapsed and expanded.
        const EXPANDABLE = 0b0000_0001;
        /// Children are part of the flattened rows.
        const EXPANDED   = 0b0000_0010;
    }
}

/// One tracked item with its cached flattening state.
#[derive(Clone, Debug)]
pub struct Node {
    pub(crate) item: AnyItem,
    pub(crate) cell_identifier: Option<String>,
    pub(crate) flags: NodeFlags,
    pub(crate) parent: Option<NodeId>,
    /// `None` until first requested.
    pub(crate) children: Option<Vec<NodeId>>,
    /// Memoized flattened row count of the subtree, excluding this node's own row.
    pub(crate) number_of_children: Option<usize>,
    /// Only set on section roots.
    pub(crate) section: Option<usize>,
    /// Rows contributed by preceding siblings.
    pub(crate) offset: usize,
    /// Position among siblings.
    pub(crate) index: usize,
    pub(crate) estimated_row_height: Option<f64>,
    /// Materialization pass that last gave this node a place in the tree.
    pub(crate) claimed: u64,
}

impl Node {
    pub(crate) fn new(item: AnyItem, cell_identifier: Option<String>, flags: NodeFlags) -> Self {
        Self {
            item,
            cell_identifier,
            flags,
            parent: None,
            children: None,
            number_of_children: None,
            section: None,
            offset: 0,
            index: 0,
            estimated_row_height: None,
            claimed: 0,
        }
    }

    pub fn item(&self) -> &AnyItem {
        &self.item
    }

    pub fn cell_identifier(&self) -> Option<&str> {
        self.cell_identifier.as_deref()
    }

    /// Returns `true` if the node occupies a row of its own.
    pub fn is_rendered(&self) -> bool {
        self.cell_identifier.is_some()
    }

    pub fn flags(&self) -> NodeFlags {
        self.flags
    }

    pub fn is_expandable(&self) -> bool {
        self.flags.contains(NodeFlags::EXPANDABLE)
    }

    pub fn is_expanded(&self) -> bool {
        self.flags.contains(NodeFlags::EXPANDED)
    }

    /// Returns `true` if the node's children are part of the flattened rows.
    /// Structural containers always show their children.
    pub fn shows_children(&self) -> bool {
        !self.is_rendered() || self.is_expanded()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Materialized children, if any have been requested yet.
    pub fn materialized_children(&self) -> Option<&[NodeId]> {
        self.children.as_deref()
    }

    /// Memoized row count, if currently valid.
    pub fn cached_number_of_children(&self) -> Option<usize> {
        self.number_of_children
    }

    pub fn section(&self) -> Option<usize> {
        self.section
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn estimated_row_height(&self) -> Option<f64> {
        self.estimated_row_height
    }
}
