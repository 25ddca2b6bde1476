//! Per-type field descriptor tables and the registry that resolves them.
//!
//! Composite resource types implement [`Tracked`] to describe their fields in
//! declaration order. A [`SchemaRegistry`] turns those declarations into
//! [`ResolvedSchema`] tables once per type, resolving each field's policy from
//! its annotations. Tables are never modified after insertion, so the
//! registry can be shared freely between concurrent admission requests.

use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;
use tracing::debug;

use super::policy::{POLICY_TAG, Policy};
use super::value::{FieldValue, Shape, downcast_eq};
use super::violation::ValidationError;
use super::walker::Walker;

/// Errors raised while registering a type's schema.
///
/// These are programming errors in a type declaration and surface when the
/// type is registered, never while validating a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("{type_name}.{field}: unrecognized mutability policy {value:?}")]
    UnrecognizedPolicy {
        type_name: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("{type_name}: field {field} declared more than once")]
    DuplicateField {
        type_name: &'static str,
        field: &'static str,
    },
}

/// Capability implemented by composite types whose fields carry policies.
///
/// `Default` must produce the zero value of the type (every field unset);
/// deriving it gives exactly that.
pub trait Tracked: Default + PartialEq + Debug + Send + Sync + 'static {
    /// Name used in error messages.
    const TYPE_NAME: &'static str;

    /// Field declarations in declaration order.
    fn schema() -> Schema<Self>;
}

impl<T: Tracked> FieldValue for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn value_type_name(&self) -> &'static str {
        T::TYPE_NAME
    }

    fn is_unset(&self) -> bool {
        *self == T::default()
    }

    fn equals(&self, other: &dyn FieldValue) -> bool {
        downcast_eq(self, other)
    }

    fn shape(&self) -> Shape<'_> {
        Shape::Object(self)
    }

    fn register_nested(registry: &SchemaRegistry) -> Result<(), SchemaError> {
        registry.register::<T>()
    }
}

/// Object-safe view of a tracked composite, used to recurse without knowing
/// the concrete type.
pub trait ObjectValue: FieldValue {
    /// Walk the fields of `self` (old) against `new` in lock-step.
    fn walk(&self, new: &dyn ObjectValue, walker: &mut Walker<'_>) -> Result<(), ValidationError>;
}

impl<T: Tracked> ObjectValue for T {
    fn walk(&self, new: &dyn ObjectValue, walker: &mut Walker<'_>) -> Result<(), ValidationError> {
        let new = new.as_any().downcast_ref::<T>().ok_or_else(|| {
            ValidationError::TypeMismatch {
                expected: T::TYPE_NAME.to_string(),
                found: new.value_type_name().to_string(),
            }
        })?;

        let schema = walker.registry().resolve::<T>()?;
        for field in schema.fields() {
            let segment = (!field.inline).then_some(field.name);
            walker.visit(segment, field.policy, field.get(self), field.get(new))?;
        }
        Ok(())
    }
}

trait FieldAccess<T>: Send + Sync {
    fn get<'a>(&self, parent: &'a T) -> &'a dyn FieldValue;

    fn register_nested(&self, registry: &SchemaRegistry) -> Result<(), SchemaError>;
}

struct Accessor<T, F> {
    get: fn(&T) -> &F,
}

impl<T: 'static, F: FieldValue> FieldAccess<T> for Accessor<T, F> {
    fn get<'a>(&self, parent: &'a T) -> &'a dyn FieldValue {
        (self.get)(parent)
    }

    fn register_nested(&self, registry: &SchemaRegistry) -> Result<(), SchemaError> {
        F::register_nested(registry)
    }
}

struct FieldDecl<T> {
    name: &'static str,
    inline: bool,
    annotations: Vec<(&'static str, &'static str)>,
    access: Box<dyn FieldAccess<T>>,
}

/// Declared fields of a tracked type, before policy resolution.
///
/// ```rust,ignore
/// Schema::new()
///     .field("backoffLimit", |s: &RestoreSpec| &s.backoff_limit)
///     .annotated("restartPolicy", POLICY_TAG, "immutable", |s: &RestoreSpec| &s.restart_policy)
/// ```
pub struct Schema<T> {
    fields: Vec<FieldDecl<T>>,
}

impl<T: 'static> Default for Schema<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Schema<T> {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Declare a field without annotations (mutable).
    pub fn field<F: FieldValue>(self, name: &'static str, get: fn(&T) -> &F) -> Self {
        self.with_annotations(name, Vec::new(), get)
    }

    /// Declare an embedded composite whose fields appear at this level of
    /// the path, like a `#[serde(flatten)]` field.
    pub fn inline<F: FieldValue>(mut self, name: &'static str, get: fn(&T) -> &F) -> Self {
        self = self.field(name, get);
        if let Some(decl) = self.fields.last_mut() {
            decl.inline = true;
        }
        self
    }

    /// Declare a field carrying one annotation, e.g. `("webhook", "immutable")`.
    pub fn annotated<F: FieldValue>(
        self,
        name: &'static str,
        key: &'static str,
        value: &'static str,
        get: fn(&T) -> &F,
    ) -> Self {
        self.with_annotations(name, vec![(key, value)], get)
    }

    /// Shorthand for an `immutable` field under the default annotation key.
    pub fn immutable<F: FieldValue>(self, name: &'static str, get: fn(&T) -> &F) -> Self {
        self.annotated(name, POLICY_TAG, Policy::Immutable.as_str(), get)
    }

    /// Shorthand for an `immutable-after-init` field under the default annotation key.
    pub fn immutable_after_init<F: FieldValue>(
        self,
        name: &'static str,
        get: fn(&T) -> &F,
    ) -> Self {
        self.annotated(name, POLICY_TAG, Policy::ImmutableAfterInit.as_str(), get)
    }

    /// Declare a field with an arbitrary annotation list.
    pub fn with_annotations<F: FieldValue>(
        mut self,
        name: &'static str,
        annotations: Vec<(&'static str, &'static str)>,
        get: fn(&T) -> &F,
    ) -> Self {
        self.fields.push(FieldDecl {
            name,
            inline: false,
            annotations,
            access: Box::new(Accessor { get }),
        });
        self
    }
}

/// A field with its resolved policy.
pub struct ResolvedField<T> {
    pub name: &'static str,
    pub policy: Policy,
    /// Flattened into the parent path.
    pub inline: bool,
    access: Box<dyn FieldAccess<T>>,
}

impl<T> ResolvedField<T> {
    pub fn get<'a>(&self, parent: &'a T) -> &'a dyn FieldValue {
        self.access.get(parent)
    }
}

/// Descriptor table of a tracked type with policies resolved.
pub struct ResolvedSchema<T> {
    type_name: &'static str,
    fields: Vec<ResolvedField<T>>,
}

impl<T: Tracked> ResolvedSchema<T> {
    fn resolve(tag_name: &str) -> Result<Self, SchemaError> {
        let mut seen = HashSet::new();
        let mut fields = Vec::new();

        for decl in T::schema().fields {
            if !seen.insert(decl.name) {
                return Err(SchemaError::DuplicateField {
                    type_name: T::TYPE_NAME,
                    field: decl.name,
                });
            }
            let policy = Policy::resolve(T::TYPE_NAME, decl.name, &decl.annotations, tag_name)?;
            fields.push(ResolvedField {
                name: decl.name,
                policy,
                inline: decl.inline,
                access: decl.access,
            });
        }

        Ok(Self {
            type_name: T::TYPE_NAME,
            fields,
        })
    }
}

impl<T> ResolvedSchema<T> {
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[ResolvedField<T>] {
        &self.fields
    }

    /// Policy of the named field, if declared.
    pub fn policy_of(&self, name: &str) -> Option<Policy> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| field.policy)
    }
}

type SchemaCache = HashMap<TypeId, Arc<dyn Any + Send + Sync>>;

/// Write-once, read-many cache of resolved schemas keyed by type.
///
/// Populate it with [`SchemaRegistry::register`] before serving traffic.
/// Types reached for the first time during validation are resolved on
/// demand, inserted once, and read thereafter.
pub struct SchemaRegistry {
    tag_name: String,
    schemas: RwLock<SchemaCache>,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new(POLICY_TAG)
    }
}

impl SchemaRegistry {
    /// Create a registry reading policies from the `tag_name` annotation key.
    pub fn new(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into(),
            schemas: RwLock::new(HashMap::new()),
        }
    }

    pub fn tag_name(&self) -> &str {
        &self.tag_name
    }

    /// Resolve and cache `T` and every tracked type reachable from it.
    pub fn register<T: Tracked>(&self) -> Result<(), SchemaError> {
        self.resolve::<T>().map(|_| ())
    }

    pub fn is_registered<T: Tracked>(&self) -> bool {
        self.read().contains_key(&TypeId::of::<T>())
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Resolved schema of `T`, resolving it on first use.
    pub fn resolve<T: Tracked>(&self) -> Result<Arc<ResolvedSchema<T>>, SchemaError> {
        if let Some(schema) = self.cached::<T>() {
            return Ok(schema);
        }

        let resolved = Arc::new(ResolvedSchema::<T>::resolve(&self.tag_name)?);
        let schema = {
            let mut schemas = self.schemas.write().unwrap_or_else(PoisonError::into_inner);
            let entry = schemas
                .entry(TypeId::of::<T>())
                .or_insert_with(|| resolved.clone() as Arc<dyn Any + Send + Sync>);
            Arc::clone(entry)
        };

        // Another thread may have won the insert; use whichever is cached.
        let schema = schema
            .downcast::<ResolvedSchema<T>>()
            .unwrap_or(resolved);

        debug!(
            type_name = T::TYPE_NAME,
            tag = %self.tag_name,
            fields = schema.fields().len(),
            "Registered schema"
        );

        // Parent is cached before its children so recursive types terminate,
        // and evicted again when a child fails so the error is not masked.
        for field in schema.fields() {
            if let Err(err) = field.access.register_nested(self) {
                self.schemas
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&TypeId::of::<T>());
                return Err(err);
            }
        }

        Ok(schema)
    }

    fn cached<T: Tracked>(&self) -> Option<Arc<ResolvedSchema<T>>> {
        let schema = self.read().get(&TypeId::of::<T>()).cloned()?;
        schema.downcast::<ResolvedSchema<T>>().ok()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, SchemaCache> {
        self.schemas.read().unwrap_or_else(PoisonError::into_inner)
    }
}
