//! Admission webhooks for MariaDB operator resources
//!
//! This module implements ValidatingAdmissionWebhook endpoints that reject
//! updates changing fields declared immutable on the Restore, Backup and
//! MariaDB specs.

pub mod policies;
mod server;

pub use policies::{ValidationResult, builtin_webhook};
pub use server::{
    AdmissionRequest, AdmissionResponse, AdmissionReview, AdmissionReviewResponse,
    AdmissionStatus, REASON_INVALID_OBJECT, WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH, WEBHOOK_PORT,
    WebhookConfig, WebhookError, WebhookState, admit, create_webhook_router, run_webhook_server,
    validate_resource,
};
