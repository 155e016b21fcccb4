//! Identity model: how two values are matched across snapshots.

use std::hash::Hash;
use std::rc::Rc;
use std::sync::Arc;

/// A value that can be matched across two snapshots.
///
/// Two values with equal [`diff_identifier`](Diffable::diff_identifier)s are
/// "the same logical entity". If they also compare unequal under
/// [`PartialEq`], the entity was updated in place.
pub trait Diffable: PartialEq {
    /// Identity key, stable across snapshots.
    type Id: Hash + Eq;

    /// The identity of this value.
    fn diff_identifier(&self) -> Self::Id;
}

macro_rules! diffable_by_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Diffable for $ty {
                type Id = $ty;

                fn diff_identifier(&self) -> Self::Id {
                    *self
                }
            }
        )*
    };
}

diffable_by_value!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, bool, char);

impl Diffable for f32 {
    type Id = u32;

    fn diff_identifier(&self) -> Self::Id {
        self.to_bits()
    }
}

impl Diffable for f64 {
    type Id = u64;

    fn diff_identifier(&self) -> Self::Id {
        self.to_bits()
    }
}

impl Diffable for String {
    type Id = String;

    fn diff_identifier(&self) -> Self::Id {
        self.clone()
    }
}

impl Diffable for str {
    type Id = String;

    fn diff_identifier(&self) -> Self::Id {
        self.to_owned()
    }
}

impl<T: Diffable + ?Sized> Diffable for &T {
    type Id = T::Id;

    fn diff_identifier(&self) -> Self::Id {
        (**self).diff_identifier()
    }
}

impl<T: Diffable + ?Sized> Diffable for Box<T> {
    type Id = T::Id;

    fn diff_identifier(&self) -> Self::Id {
        (**self).diff_identifier()
    }
}

impl<T: Diffable + ?Sized> Diffable for Arc<T> {
    type Id = T::Id;

    fn diff_identifier(&self) -> Self::Id {
        (**self).diff_identifier()
    }
}

impl<T: Diffable + ?Sized> Diffable for Rc<T> {
    type Id = T::Id;

    fn diff_identifier(&self) -> Self::Id {
        (**self).diff_identifier()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_identify_by_value() {
        assert_eq!(7u32.diff_identifier(), 7);
        assert_eq!('x'.diff_identifier(), 'x');
        assert_eq!(1.5f64.diff_identifier(), 1.5f64.to_bits());
    }

    #[test]
    fn smart_pointers_delegate() {
        let s = String::from("A1");
        assert_eq!(Arc::new(s.clone()).diff_identifier(), "A1");
        assert_eq!(Box::new(s.clone()).diff_identifier(), "A1");
        assert_eq!(Rc::new(s.clone()).diff_identifier(), "A1");
        assert_eq!((&s).diff_identifier(), "A1");
        assert_eq!("A1".diff_identifier(), "A1");
    }
}
