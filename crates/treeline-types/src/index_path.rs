use std::fmt;

use serde::{Deserialize, Serialize};

/// Address of a row in a sectioned list.
///
/// Ordering is lexicographic: `section` first, then `row`. This matches the
/// order in which rows are laid out on screen.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct IndexPath {
    /// Top-level bucket.
    pub section: usize,
    /// Position within the section.
    pub row: usize,
}

impl IndexPath {
    /// Create a new index path.
    pub const fn new(section: usize, row: usize) -> Self {
        Self { section, row }
    }

    /// The same section, `delta` rows further down.
    pub const fn offset_by(self, delta: usize) -> Self {
        Self {
            section: self.section,
            row: self.row + delta,
        }
    }

    /// Same section, different row.
    pub const fn with_row(self, row: usize) -> Self {
        Self {
            section: self.section,
            row,
        }
    }
}

impl fmt::Debug for IndexPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.section, self.row)
    }
}

impl fmt::Display for IndexPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.section, self.row)
    }
}

impl From<(usize, usize)> for IndexPath {
    fn from((section, row): (usize, usize)) -> Self {
        Self::new(section, row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_section_major() {
        let a = IndexPath::new(0, 9);
        let b = IndexPath::new(1, 0);
        assert!(a < b);
        assert!(IndexPath::new(1, 1) > IndexPath::new(1, 0));
    }

    #[test]
    fn offset_keeps_section() {
        let p = IndexPath::new(2, 3).offset_by(4);
        assert_eq!(p, IndexPath::new(2, 7));
        assert_eq!(p.with_row(0), IndexPath::new(2, 0));
    }

    #[test]
    fn display_and_debug() {
        let p = IndexPath::from((1, 5));
        assert_eq!(p.to_string(), "1:5");
        assert_eq!(format!("{p:?}"), "[1, 5]");
    }

    #[test]
    fn serde_shape() {
        let json = serde_json::to_string(&IndexPath::new(3, 4)).unwrap();
        assert_eq!(json, r#"{"section":3,"row":4}"#);
    }
}
