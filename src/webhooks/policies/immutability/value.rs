//! Uniform view over field values: unset classification and deep equality.
//!
//! Every type that can appear as a field of a tracked resource implements
//! [`FieldValue`]. The equality strategy is fixed per type:
//! - leaves compare with `PartialEq` and are unset when equal to their
//!   `Default` (empty string, zero, `false`, first enum variant marked default)
//! - `Option<T>` is unset only when `None`; `Some(zero)` counts as set
//! - `Vec<T>` compares element by element in order, unset when empty
//! - `BTreeMap`/`BTreeSet` compare regardless of insertion order, unset when empty
//!
//! `Vec` and `BTreeMap` also expose their elements so that policies declared
//! inside tracked elements are enforced. Set members have no stable position
//! and are only compared as a whole.
//! - tracked composites compare field by field (see [`super::Tracked`])

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Debug, Display};

use super::schema::{ObjectValue, SchemaError, SchemaRegistry};

/// How the structural walker should treat a value.
pub enum Shape<'a> {
    /// Compared as a whole.
    Leaf,
    /// A tracked composite whose fields carry their own policies.
    Object(&'a dyn ObjectValue),
    /// A nilable value; `None` is the absent marker.
    Optional(Option<&'a dyn FieldValue>),
    /// Ordered elements, walked pairwise by index.
    Sequence(Vec<&'a dyn FieldValue>),
    /// Keyed entries, walked pairwise by key.
    Map(Vec<(String, &'a dyn FieldValue)>),
}

/// A value the immutability walker can classify and compare.
pub trait FieldValue: Any + Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;

    /// Name of the concrete type, for diagnostics.
    fn value_type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Whether the value is in its unset (zero or absent) state.
    fn is_unset(&self) -> bool;

    /// Deep structural equality. Values of different concrete types are never equal.
    fn equals(&self, other: &dyn FieldValue) -> bool;

    fn shape(&self) -> Shape<'_> {
        Shape::Leaf
    }

    /// Register any tracked types reachable through this value.
    fn register_nested(registry: &SchemaRegistry) -> Result<(), SchemaError>
    where
        Self: Sized,
    {
        let _ = registry;
        Ok(())
    }
}

/// Equality helper shared by all `PartialEq` backed implementations.
pub fn downcast_eq<T: PartialEq + 'static>(this: &T, other: &dyn FieldValue) -> bool {
    other
        .as_any()
        .downcast_ref::<T>()
        .is_some_and(|other| this == other)
}

/// Implement [`FieldValue`] for leaf types whose zero value is their `Default`.
#[macro_export]
macro_rules! leaf_field_values {
    ($($ty:ty),* $(,)?) => {
        $(
            impl $crate::webhooks::policies::immutability::FieldValue for $ty {
                fn as_any(&self) -> &dyn ::std::any::Any {
                    self
                }

                fn is_unset(&self) -> bool {
                    *self == <$ty as ::std::default::Default>::default()
                }

                fn equals(
                    &self,
                    other: &dyn $crate::webhooks::policies::immutability::FieldValue,
                ) -> bool {
                    $crate::webhooks::policies::immutability::downcast_eq(self, other)
                }
            }
        )*
    };
}

leaf_field_values!(
    String, bool, char, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64,
);

impl<T: FieldValue + PartialEq> FieldValue for Option<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn is_unset(&self) -> bool {
        self.is_none()
    }

    fn equals(&self, other: &dyn FieldValue) -> bool {
        downcast_eq(self, other)
    }

    fn shape(&self) -> Shape<'_> {
        Shape::Optional(self.as_ref().map(|value| value as &dyn FieldValue))
    }

    fn register_nested(registry: &SchemaRegistry) -> Result<(), SchemaError> {
        T::register_nested(registry)
    }
}

impl<T: FieldValue + PartialEq> FieldValue for Vec<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn is_unset(&self) -> bool {
        self.is_empty()
    }

    fn equals(&self, other: &dyn FieldValue) -> bool {
        downcast_eq(self, other)
    }

    fn shape(&self) -> Shape<'_> {
        Shape::Sequence(self.iter().map(|item| item as &dyn FieldValue).collect())
    }

    fn register_nested(registry: &SchemaRegistry) -> Result<(), SchemaError> {
        T::register_nested(registry)
    }
}

impl<T> FieldValue for BTreeSet<T>
where
    T: Ord + Debug + Send + Sync + 'static,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn is_unset(&self) -> bool {
        self.is_empty()
    }

    fn equals(&self, other: &dyn FieldValue) -> bool {
        downcast_eq(self, other)
    }
}

impl<K, V> FieldValue for BTreeMap<K, V>
where
    K: Ord + Debug + Display + Send + Sync + 'static,
    V: FieldValue + PartialEq,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn is_unset(&self) -> bool {
        self.is_empty()
    }

    fn equals(&self, other: &dyn FieldValue) -> bool {
        downcast_eq(self, other)
    }

    fn shape(&self) -> Shape<'_> {
        Shape::Map(
            self.iter()
                .map(|(key, value)| (key.to_string(), value as &dyn FieldValue))
                .collect(),
        )
    }

    fn register_nested(registry: &SchemaRegistry) -> Result<(), SchemaError> {
        V::register_nested(registry)
    }
}
