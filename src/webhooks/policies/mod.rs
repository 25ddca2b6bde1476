//! Admission webhook policies
//!
//! The only policy enforced on updates is field immutability, declared per
//! field on each resource spec (see [`immutability`]).

pub mod immutability;

pub use immutability::{ImmutableWebhook, SchemaError, TrackedResource, ValidationError};

use crate::crd::{BackupSpec, MariaDbSpec, RestoreSpec};

/// Reason reported when an update changes a protected field
pub const REASON_FIELD_IMMUTABLE: &str = "FieldImmutable";
/// Reason reported when the webhook itself is misconfigured
pub const REASON_INTERNAL_ERROR: &str = "InternalError";

/// Result of a policy validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub allowed: bool,
    /// HTTP-style status code reported in the admission response
    pub code: u16,
    pub reason: Option<String>,
    pub message: Option<String>,
    /// Number of fields that breached their policy
    pub violations: usize,
}

impl ValidationResult {
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            code: 200,
            reason: None,
            message: None,
            violations: 0,
        }
    }

    pub fn denied(reason: &str, message: &str) -> Self {
        Self::rejected(403, reason, message)
    }

    /// The request itself could not be understood.
    pub fn invalid(reason: &str, message: &str) -> Self {
        Self::rejected(400, reason, message)
    }

    /// The webhook failed for reasons the requester cannot fix.
    pub fn internal(message: &str) -> Self {
        Self::rejected(500, REASON_INTERNAL_ERROR, message)
    }

    fn rejected(code: u16, reason: &str, message: &str) -> Self {
        Self {
            allowed: false,
            code,
            reason: Some(reason.to_string()),
            message: Some(message.to_string()),
            violations: 0,
        }
    }
}

impl From<Result<(), ValidationError>> for ValidationResult {
    fn from(result: Result<(), ValidationError>) -> Self {
        match result {
            Ok(()) => ValidationResult::allowed(),
            Err(ValidationError::Aggregate(violations)) => {
                let mut result = ValidationResult::denied(
                    REASON_FIELD_IMMUTABLE,
                    &format!("Update rejected: {}", violations),
                );
                result.violations = violations.len();
                result
            }
            // Caller defects are not reported to the user as policy failures.
            Err(_) => ValidationResult::internal("Internal error while validating the update"),
        }
    }
}

/// Webhook with every resource spec shipped by the operator registered.
///
/// Fails if any spec declares an unrecognized policy.
pub fn builtin_webhook(tag_name: &str) -> Result<ImmutableWebhook, SchemaError> {
    ImmutableWebhook::builder()
        .tag_name(tag_name)
        .register::<RestoreSpec>()
        .register::<BackupSpec>()
        .register::<MariaDbSpec>()
        .build()
}
