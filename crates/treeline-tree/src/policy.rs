use crate::item::AnyItem;

/// Per-item presentation policy consulted when a node is first created.
pub trait NodePolicy {
    /// View template for the item's row. `None` makes the node a structural
    /// container: it occupies no row and its children are spliced into its
    /// parent's position.
    fn cell_identifier(&self, item: &AnyItem) -> Option<String>;

    /// Whether the row can be collapsed and expanded.
    fn is_expandable(&self, _item: &AnyItem) -> bool {
        false
    }

    /// Initial expansion state of an expandable row.
    fn is_expanded(&self, _item: &AnyItem) -> bool {
        true
    }
}

/// Policy that renders every item with one cell template and never collapses.
#[derive(Clone, Debug)]
pub struct UniformPolicy {
    pub cell_identifier: String,
}

impl UniformPolicy {
    pub fn new(cell_identifier: impl Into<String>) -> Self {
        Self {
            cell_identifier: cell_identifier.into(),
        }
    }
}

impl NodePolicy for UniformPolicy {
    fn cell_identifier(&self, _item: &AnyItem) -> Option<String> {
        Some(self.cell_identifier.clone())
    }
}
