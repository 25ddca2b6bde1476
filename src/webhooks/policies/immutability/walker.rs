//! Lock-step traversal of two versions of a tracked object.

use tracing::debug;

use super::policy::Policy;
use super::schema::{ObjectValue, SchemaRegistry};
use super::value::{FieldValue, Shape};
use super::violation::{FieldPath, PathSegment, ValidationError, Violation};

/// Walks old and new values side by side, recording every policy breach.
///
/// The walk never stops at the first violation; only type errors abort it.
pub struct Walker<'r> {
    registry: &'r SchemaRegistry,
    path: FieldPath,
    violations: Vec<Violation>,
}

impl<'r> Walker<'r> {
    pub(crate) fn new(registry: &'r SchemaRegistry, root: &'static str) -> Self {
        Self {
            registry,
            path: FieldPath::root(root),
            violations: Vec::new(),
        }
    }

    pub fn registry(&self) -> &'r SchemaRegistry {
        self.registry
    }

    /// Check one field, then descend into it. Inline fields pass no segment.
    ///
    /// A declared policy is applied to the field as a whole. Composite values
    /// are then walked so their children's own policies apply as well. An
    /// optional composite is only walked when present on both sides; when it
    /// appears or disappears, the field's own policy is all that applies.
    /// Collections are walked element by element for indices or keys present
    /// on both sides.
    pub(crate) fn visit(
        &mut self,
        segment: Option<&'static str>,
        policy: Policy,
        old: &dyn FieldValue,
        new: &dyn FieldValue,
    ) -> Result<(), ValidationError> {
        if let Some(segment) = segment {
            self.path.push(PathSegment::Field(segment));
        }
        if !policy.permits(old, new) {
            debug!(
                path = %self.path,
                policy = %policy,
                old = ?old,
                new = ?new,
                "Policy violation"
            );
            self.violations.push(Violation {
                path: self.path.clone(),
                policy,
            });
        }
        let result = self.descend(old, new);
        if segment.is_some() {
            self.path.pop();
        }
        result
    }

    fn descend(&mut self, old: &dyn FieldValue, new: &dyn FieldValue) -> Result<(), ValidationError> {
        match (old.shape(), new.shape()) {
            (Shape::Leaf, Shape::Leaf) => Ok(()),
            (Shape::Object(old), Shape::Object(new)) => old.walk(new, self),
            (Shape::Optional(Some(old)), Shape::Optional(Some(new))) => self.descend(old, new),
            (Shape::Optional(_), Shape::Optional(_)) => Ok(()),
            (Shape::Sequence(old), Shape::Sequence(new)) => {
                for (index, (old, new)) in old.into_iter().zip(new).enumerate() {
                    self.element(PathSegment::Index(index), old, new)?;
                }
                Ok(())
            }
            (Shape::Map(old), Shape::Map(new)) => {
                for (key, old) in old {
                    if let Some((_, new)) = new.iter().find(|(other, _)| *other == key) {
                        self.element(PathSegment::Key(key), old, *new)?;
                    }
                }
                Ok(())
            }
            _ => Err(ValidationError::TypeMismatch {
                expected: old.value_type_name().to_string(),
                found: new.value_type_name().to_string(),
            }),
        }
    }

    // Elements carry no policy of their own; only nested declarations apply.
    fn element(
        &mut self,
        segment: PathSegment,
        old: &dyn FieldValue,
        new: &dyn FieldValue,
    ) -> Result<(), ValidationError> {
        self.path.push(segment);
        let result = self.descend(old, new);
        self.path.pop();
        result
    }

    fn finish(self) -> Vec<Violation> {
        self.violations
    }
}

/// Compare `old` against `new` and return every violation in traversal order.
///
/// Paths are rooted at `root`. Fails with [`ValidationError::TypeMismatch`]
/// when the two objects are not of the same concrete type.
pub fn compare(
    registry: &SchemaRegistry,
    root: &'static str,
    old: &dyn ObjectValue,
    new: &dyn ObjectValue,
) -> Result<Vec<Violation>, ValidationError> {
    let mut walker = Walker::new(registry, root);
    old.walk(new, &mut walker)?;
    Ok(walker.finish())
}
