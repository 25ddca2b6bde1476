//! Field mutability policies and their resolution from field annotations.

use std::fmt;
use std::str::FromStr;

use super::schema::SchemaError;
use super::value::FieldValue;

/// Default annotation key read when resolving a field's policy.
pub const POLICY_TAG: &str = "webhook";

/// Mutability rule declared on a field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Policy {
    /// Unrestricted. Applies to every field without a declaration.
    #[default]
    Mutable,
    /// Old and new values must always be equal.
    Immutable,
    /// The value may go from unset to set once; after that it must stay equal.
    ImmutableAfterInit,
}

impl Policy {
    /// Annotation value naming this policy.
    pub fn as_str(&self) -> &'static str {
        match self {
            Policy::Mutable => "mutable",
            Policy::Immutable => "immutable",
            Policy::ImmutableAfterInit => "immutable-after-init",
        }
    }

    /// Whether changing a field from `old` to `new` is allowed.
    ///
    /// - `Mutable` allows any change.
    /// - `Immutable` requires deep equality, whatever the unset state.
    /// - `ImmutableAfterInit` allows anything while `old` is unset and
    ///   requires equality once it is set.
    pub fn permits(&self, old: &dyn FieldValue, new: &dyn FieldValue) -> bool {
        match self {
            Policy::Mutable => true,
            Policy::Immutable => old.equals(new),
            Policy::ImmutableAfterInit => old.is_unset() || old.equals(new),
        }
    }

    /// Resolve a field's policy from its annotations.
    ///
    /// Only the annotation stored under `tag_name` is considered. A field
    /// without that annotation is [`Policy::Mutable`]. An unrecognized value
    /// is a schema error, reported when the owning type is registered.
    pub fn resolve(
        type_name: &'static str,
        field: &'static str,
        annotations: &[(&'static str, &'static str)],
        tag_name: &str,
    ) -> Result<Self, SchemaError> {
        let Some((_, value)) = annotations.iter().find(|(key, _)| *key == tag_name) else {
            return Ok(Policy::Mutable);
        };

        value
            .parse()
            .map_err(|_| SchemaError::UnrecognizedPolicy {
                type_name,
                field,
                value: (*value).to_string(),
            })
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown policy name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized mutability policy: {0:?}")]
pub struct ParsePolicyError(pub String);

impl FromStr for Policy {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mutable" => Ok(Policy::Mutable),
            "immutable" => Ok(Policy::Immutable),
            "immutable-after-init" => Ok(Policy::ImmutableAfterInit),
            other => Err(ParsePolicyError(other.to_string())),
        }
    }
}
