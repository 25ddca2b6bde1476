//! Immutability policy validation
//!
//! Enforces per-field mutability declared on resource specs when an object is
//! updated. Each field carries one of three policies:
//! - `mutable` (default): any change is allowed
//! - `immutable`: old and new values must be equal
//! - `immutable-after-init`: the field may be set once, then must not change
//!
//! [`ImmutableWebhook::validate_update`] walks old and new specs in lock-step
//! and reports every violated field path at once.

mod policy;
mod schema;
mod value;
mod violation;
mod walker;

use std::sync::Arc;

use kube::Resource;
use serde::de::DeserializeOwned;
use tracing::{debug, error};

pub use policy::{POLICY_TAG, ParsePolicyError, Policy};
pub use schema::{
    ObjectValue, ResolvedField, ResolvedSchema, Schema, SchemaError, SchemaRegistry, Tracked,
};
pub use value::{FieldValue, Shape, downcast_eq};
pub use violation::{FieldPath, PathSegment, ValidationError, Violation, Violations, collect};
pub use walker::{Walker, compare};

/// Root segment of every reported field path.
pub const ROOT_PATH: &str = "spec";

/// A custom resource whose spec is validated on update.
pub trait TrackedResource: Resource<DynamicType = ()> + DeserializeOwned {
    type Spec: Tracked;

    fn tracked_spec(&self) -> &Self::Spec;
}

type Registration = fn(&SchemaRegistry) -> Result<(), SchemaError>;

/// Validates updates against the mutability policies of registered types.
///
/// Cheap to clone; clones share the same schema registry.
#[derive(Clone)]
pub struct ImmutableWebhook {
    registry: Arc<SchemaRegistry>,
}

impl Default for ImmutableWebhook {
    fn default() -> Self {
        Self::new()
    }
}

impl ImmutableWebhook {
    /// Webhook reading policies from the default `webhook` annotation key.
    pub fn new() -> Self {
        Self {
            registry: Arc::new(SchemaRegistry::default()),
        }
    }

    pub fn builder() -> ImmutableWebhookBuilder {
        ImmutableWebhookBuilder::default()
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Register `T` (and every tracked type it contains) ahead of traffic.
    pub fn register<T: Tracked>(&self) -> Result<(), SchemaError> {
        self.registry.register::<T>()
    }

    /// Validate an update of a spec. Accepts when no field breaches its policy.
    pub fn validate_update<T: Tracked>(&self, new: &T, old: &T) -> Result<(), ValidationError> {
        self.validate_update_dyn(new, old)
    }

    /// Validate an update of a custom resource by comparing its specs.
    pub fn validate_resource<K: TrackedResource>(
        &self,
        new: &K,
        old: &K,
    ) -> Result<(), ValidationError> {
        self.validate_update(new.tracked_spec(), old.tracked_spec())
    }

    /// Validate an update where the concrete types are only known at runtime.
    ///
    /// Returns [`ValidationError::TypeMismatch`] if `new` and `old` differ in type.
    pub fn validate_update_dyn(
        &self,
        new: &dyn ObjectValue,
        old: &dyn ObjectValue,
    ) -> Result<(), ValidationError> {
        let violations = compare(&self.registry, ROOT_PATH, old, new).inspect_err(|e| {
            error!(error = %e, "Immutability validation aborted");
        })?;

        debug!(
            type_name = new.value_type_name(),
            violations = violations.len(),
            "Validated update"
        );
        collect(violations)
    }
}

/// Builder for [`ImmutableWebhook`].
#[derive(Default)]
pub struct ImmutableWebhookBuilder {
    tag_name: Option<String>,
    registrations: Vec<Registration>,
}

impl ImmutableWebhookBuilder {
    /// Annotation key to read policies from (defaults to `webhook`).
    pub fn tag_name(mut self, tag_name: impl Into<String>) -> Self {
        self.tag_name = Some(tag_name.into());
        self
    }

    /// Register `T` when the webhook is built.
    pub fn register<T: Tracked>(mut self) -> Self {
        self.registrations.push(|registry| registry.register::<T>());
        self
    }

    /// Build the webhook, failing on the first invalid type declaration.
    pub fn build(self) -> Result<ImmutableWebhook, SchemaError> {
        let tag_name = self.tag_name.unwrap_or_else(|| POLICY_TAG.to_string());
        let registry = SchemaRegistry::new(tag_name);
        for register in self.registrations {
            register(&registry)?;
        }
        Ok(ImmutableWebhook {
            registry: Arc::new(registry),
        })
    }
}
