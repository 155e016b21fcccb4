//! Type-erased diff identifiers.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use treeline_diff::Diffable;

trait KeyBox: Send + Sync + fmt::Debug {
    fn as_any(&self) -> &dyn Any;
    fn eq_box(&self, other: &dyn KeyBox) -> bool;
    fn hash_box(&self, state: &mut dyn Hasher);
}

impl<K> KeyBox for K
where
    K: Hash + Eq + fmt::Debug + Send + Sync + 'static,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn eq_box(&self, other: &dyn KeyBox) -> bool {
        other.as_any().downcast_ref::<K>() == Some(self)
    }

    fn hash_box(&self, mut state: &mut dyn Hasher) {
        TypeId::of::<K>().hash(&mut state);
        self.hash(&mut state);
    }
}

/// A hashable identifier of any concrete type.
///
/// Two keys are equal only if they wrap the same concrete type and the wrapped
/// values compare equal. Cloning is a reference-count bump.
#[derive(Clone)]
pub struct DiffKey(Arc<dyn KeyBox>);

impl DiffKey {
    /// Wrap a concrete identifier.
    pub fn new<K>(key: K) -> Self
    where
        K: Hash + Eq + fmt::Debug + Send + Sync + 'static,
    {
        Self(Arc::new(key))
    }

    /// Borrow the wrapped identifier if it has type `K`.
    pub fn downcast_ref<K: 'static>(&self) -> Option<&K> {
        self.0.as_any().downcast_ref::<K>()
    }
}

impl PartialEq for DiffKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_box(&*other.0)
    }
}

impl Eq for DiffKey {}

impl Hash for DiffKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash_box(state);
    }
}

impl Diffable for DiffKey {
    type Id = DiffKey;

    fn diff_identifier(&self) -> DiffKey {
        self.clone()
    }
}

impl fmt::Debug for DiffKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn equal_values_of_same_type_match() {
        assert_eq!(DiffKey::new("A1".to_string()), DiffKey::new("A1".to_string()));
        assert_ne!(DiffKey::new("A1".to_string()), DiffKey::new("A2".to_string()));
    }

    #[test]
    fn different_types_never_match() {
        assert_ne!(DiffKey::new(1u32), DiffKey::new(1u64));
    }

    #[test]
    fn usable_as_hash_key() {
        let mut set = HashSet::new();
        set.insert(DiffKey::new(7u32));
        set.insert(DiffKey::new(7u32));
        set.insert(DiffKey::new("7".to_string()));
        assert_eq!(set.len(), 2);
        assert!(set.contains(&DiffKey::new(7u32)));
    }

    #[test]
    fn downcast_and_debug() {
        let key = DiffKey::new("B".to_string());
        assert_eq!(key.downcast_ref::<String>().map(String::as_str), Some("B"));
        assert!(key.downcast_ref::<u32>().is_none());
        assert_eq!(format!("{key:?}"), "\"B\"");
    }
}
