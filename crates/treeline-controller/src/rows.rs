//! The flattened rows backing the list view.

use treeline_tree::AnyItem;
use treeline_types::IndexPath;

use crate::view::RowSource;

/// Visible items per section, in display order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Rows {
    sections: Vec<Vec<AnyItem>>,
}

impl Rows {
    pub fn new(sections: Vec<Vec<AnyItem>>) -> Self {
        Self { sections }
    }

    pub fn sections(&self) -> &[Vec<AnyItem>] {
        &self.sections
    }

    pub fn section(&self, section: usize) -> Option<&[AnyItem]> {
        self.sections.get(section).map(Vec::as_slice)
    }

    pub(crate) fn section_mut(&mut self, section: usize) -> Option<&mut Vec<AnyItem>> {
        self.sections.get_mut(section)
    }

    pub fn get(&self, index_path: IndexPath) -> Option<&AnyItem> {
        self.sections.get(index_path.section)?.get(index_path.row)
    }

    /// Number of sections.
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Number of rows across all sections.
    pub fn total(&self) -> usize {
        self.sections.iter().map(Vec::len).sum()
    }

    /// Position of `index_path` in the concatenation of all sections.
    pub fn global_index(&self, index_path: IndexPath) -> usize {
        self.sections
            .iter()
            .take(index_path.section)
            .map(Vec::len)
            .sum::<usize>()
            + index_path.row
    }

    /// Inverse of [`Rows::global_index`].
    pub fn at_global(&self, mut index: usize) -> Option<(IndexPath, &AnyItem)> {
        for (section, rows) in self.sections.iter().enumerate() {
            if index < rows.len() {
                return Some((IndexPath::new(section, index), &rows[index]));
            }
            index -= rows.len();
        }
        None
    }

    /// Every row with its index path.
    pub fn iter(&self) -> impl Iterator<Item = (IndexPath, &AnyItem)> {
        self.sections.iter().enumerate().flat_map(|(section, rows)| {
            rows.iter()
                .enumerate()
                .map(move |(row, item)| (IndexPath::new(section, row), item))
        })
    }
}

impl RowSource for Rows {
    fn number_of_sections(&self) -> usize {
        self.sections.len()
    }

    fn number_of_rows(&self, section: usize) -> usize {
        self.sections.get(section).map_or(0, Vec::len)
    }

    fn item_at(&self, index_path: IndexPath) -> Option<AnyItem> {
        self.get(index_path).cloned()
    }
}
