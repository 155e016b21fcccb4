//! Hierarchical items and their type-erased handle.
//!
//! Callers describe their data with [`TreeItem`]; the arena stores every item
//! as an [`AnyItem`] so trees may mix item types at different levels.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use treeline_diff::Diffable;

use crate::key::DiffKey;

/// A node of caller-supplied hierarchical content.
///
/// Identity comes from [`Diffable::diff_identifier`], value equality from
/// [`PartialEq`]. Leaf-only types set `type Child = Leaf`.
pub trait TreeItem:
    Diffable<Id: fmt::Debug + Send + Sync + 'static> + Clone + fmt::Debug + Send + Sync + 'static
{
    /// Item type of this item's children.
    type Child: TreeItem;

    /// Ordered children, or `None` for a leaf.
    fn children(&self) -> Option<&[Self::Child]> {
        None
    }
}

/// Uninhabited child type for items that never have children.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Leaf {}

impl Diffable for Leaf {
    type Id = Leaf;

    fn diff_identifier(&self) -> Self::Id {
        match *self {}
    }
}

impl TreeItem for Leaf {
    type Child = Leaf;
}

impl TreeItem for String {
    type Child = Leaf;
}

trait ErasedItem: Send + Sync + fmt::Debug {
    fn as_any(&self) -> &dyn Any;
    fn key(&self) -> DiffKey;
    fn eq_item(&self, other: &dyn ErasedItem) -> bool;
    fn child_items(&self) -> Option<Vec<AnyItem>>;
    fn type_name(&self) -> &'static str;
}

impl<T: TreeItem> ErasedItem for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn key(&self) -> DiffKey {
        DiffKey::new(self.diff_identifier())
    }

    fn eq_item(&self, other: &dyn ErasedItem) -> bool {
        other.as_any().downcast_ref::<T>() == Some(self)
    }

    fn child_items(&self) -> Option<Vec<AnyItem>> {
        self.children()
            .map(|children| children.iter().cloned().map(AnyItem::new).collect())
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// A cheaply cloneable, type-erased [`TreeItem`].
#[derive(Clone)]
pub struct AnyItem(Arc<dyn ErasedItem>);

impl AnyItem {
    /// Erase a concrete item.
    pub fn new<T: TreeItem>(item: T) -> Self {
        Self(Arc::new(item))
    }

    /// Identity key of the wrapped item.
    pub fn key(&self) -> DiffKey {
        self.0.key()
    }

    /// The wrapped item's children, each erased.
    pub fn children(&self) -> Option<Vec<AnyItem>> {
        self.0.child_items()
    }

    /// Borrow the wrapped item if it is a `T`.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    /// Returns `true` if the wrapped item is a `T`.
    pub fn is<T: 'static>(&self) -> bool {
        self.0.as_any().is::<T>()
    }

    /// Name of the wrapped concrete type.
    pub fn type_name(&self) -> &'static str {
        self.0.type_name()
    }

    /// Returns `true` if both handles share the same allocation.
    pub fn ptr_eq(&self, other: &AnyItem) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for AnyItem {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.0.eq_item(&*other.0)
    }
}

impl Diffable for AnyItem {
    type Id = DiffKey;

    fn diff_identifier(&self) -> DiffKey {
        self.key()
    }
}

impl fmt::Debug for AnyItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Folder {
        name: String,
        files: Vec<String>,
    }

    impl Diffable for Folder {
        type Id = String;

        fn diff_identifier(&self) -> String {
            self.name.clone()
        }
    }

    impl TreeItem for Folder {
        type Child = String;

        fn children(&self) -> Option<&[String]> {
            Some(&self.files)
        }
    }

    fn folder(name: &str, files: &[&str]) -> Folder {
        Folder {
            name: name.to_string(),
            files: files.iter().map(|f| f.to_string()).collect(),
        }
    }

    #[test]
    fn erased_children_keep_order() {
        let item = AnyItem::new(folder("src", &["lib.rs", "main.rs"]));
        let children = item.children().unwrap();
        let names: Vec<&str> = children
            .iter()
            .filter_map(|c| c.downcast_ref::<String>().map(String::as_str))
            .collect();
        assert_eq!(names, ["lib.rs", "main.rs"]);
        assert!(AnyItem::new("x".to_string()).children().is_none());
    }

    #[test]
    fn identity_and_value_equality_are_separate() {
        let a = AnyItem::new(folder("src", &["lib.rs"]));
        let b = AnyItem::new(folder("src", &["lib.rs", "main.rs"]));
        assert_eq!(a.diff_identifier(), b.diff_identifier());
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn different_types_are_never_equal() {
        let a = AnyItem::new("src".to_string());
        let b = AnyItem::new(folder("src", &[]));
        assert_ne!(a, b);
        assert!(a.is::<String>());
        assert!(!b.is::<String>());
        assert!(b.type_name().ends_with("Folder"));
    }
}
