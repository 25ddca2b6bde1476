//! Policy violations and the aggregated validation error.

use std::fmt;

use thiserror::Error;

use super::policy::Policy;
use super::schema::SchemaError;

/// One step of a [`FieldPath`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Named field, rendered as `.name`
    Field(&'static str),
    /// Sequence element, rendered as `[index]`
    Index(usize),
    /// Map entry, rendered as `[key]`
    Key(String),
}

/// Dot/bracket-qualified location of a field inside the validated object,
/// e.g. `spec.env[0].value` or `spec.podLabels[app]`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct FieldPath(Vec<PathSegment>);

impl FieldPath {
    pub fn root(name: &'static str) -> Self {
        Self(vec![PathSegment::Field(name)])
    }

    pub fn child(&self, name: &'static str) -> Self {
        self.with(PathSegment::Field(name))
    }

    pub fn index(&self, index: usize) -> Self {
        self.with(PathSegment::Index(index))
    }

    pub fn key(&self, key: impl Into<String>) -> Self {
        self.with(PathSegment::Key(key.into()))
    }

    fn with(&self, segment: PathSegment) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment);
        Self(segments)
    }

    pub(crate) fn push(&mut self, segment: PathSegment) {
        self.0.push(segment);
    }

    pub(crate) fn pop(&mut self) {
        self.0.pop();
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Field(name) if i == 0 => f.write_str(name)?,
                PathSegment::Field(name) => write!(f, ".{name}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
                PathSegment::Key(key) => write!(f, "[{key}]")?,
            }
        }
        Ok(())
    }
}

/// A breach of one field's declared policy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    pub path: FieldPath,
    pub policy: Policy,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.policy {
            Policy::Immutable => write!(f, "{}: field is immutable", self.path),
            Policy::ImmutableAfterInit => {
                write!(f, "{}: field is immutable after initialization", self.path)
            }
            // Never produced by the walker; kept total for display.
            Policy::Mutable => write!(f, "{}: field is mutable", self.path),
        }
    }
}

/// Every violation found in one validation, in traversal order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Violations(Vec<Violation>);

impl Violations {
    pub fn iter(&self) -> std::slice::Iter<'_, Violation> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether a violation was reported for the dotted `path`.
    pub fn contains_path(&self, path: &str) -> bool {
        self.0.iter().any(|v| v.path.to_string() == path)
    }

    /// Violated paths rendered as strings, in traversal order.
    pub fn paths(&self) -> Vec<String> {
        self.0.iter().map(|v| v.path.to_string()).collect()
    }

    pub fn into_inner(self) -> Vec<Violation> {
        self.0
    }
}

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, violation) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", violation)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Violations {
    type Item = &'a Violation;
    type IntoIter = std::slice::Iter<'a, Violation>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Outcome of a failed update validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// One or more fields breached their policy. The update must be rejected.
    #[error("{0}")]
    Aggregate(Violations),

    /// Old and new objects have different concrete types. This is a defect in
    /// the caller, not something the end user can fix.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// A type reached during validation has an invalid declaration.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),
}

impl ValidationError {
    /// Whether the error describes the user's update rather than a defect.
    pub fn is_user_facing(&self) -> bool {
        matches!(self, ValidationError::Aggregate(_))
    }

    pub fn violations(&self) -> Option<&Violations> {
        match self {
            ValidationError::Aggregate(violations) => Some(violations),
            _ => None,
        }
    }
}

/// Turn collected violations into a validation result.
pub fn collect(violations: Vec<Violation>) -> Result<(), ValidationError> {
    if violations.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::Aggregate(Violations(violations)))
    }
}
