//! Webhook HTTP server handlers
//!
//! Implements the ValidatingAdmissionWebhook HTTP endpoints for the Restore,
//! Backup and MariaDB resources. Only UPDATE requests reach the immutability
//! engine; every other operation is admitted as is.

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::post};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info, warn};

use super::policies::{
    ImmutableWebhook, SchemaError, TrackedResource, ValidationError, ValidationResult,
};
use crate::crd::{Backup, MariaDB, Restore};
use crate::health::HealthState;

/// Reason reported when the submitted objects cannot be decoded
pub const REASON_INVALID_OBJECT: &str = "InvalidObject";

/// Kubernetes AdmissionReview request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReview {
    pub api_version: String,
    pub kind: String,
    pub request: Option<AdmissionRequest>,
}

/// AdmissionRequest contains the details of the admission request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionRequest {
    pub uid: String,
    pub kind: GroupVersionKind,
    pub resource: GroupVersionResource,
    pub operation: String,
    pub namespace: Option<String>,
    pub name: Option<String>,
    pub object: Option<serde_json::Value>,
    pub old_object: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupVersionKind {
    pub group: String,
    pub version: String,
    pub kind: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupVersionResource {
    pub group: String,
    pub version: String,
    pub resource: String,
}

/// AdmissionReview response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReviewResponse {
    pub api_version: String,
    pub kind: String,
    pub response: AdmissionResponse,
}

/// AdmissionResponse contains the result
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionResponse {
    pub uid: String,
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AdmissionStatus>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionStatus {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Shared state for webhook handlers
pub struct WebhookState {
    pub webhook: ImmutableWebhook,
    /// Metrics sink, absent when the health server is not running
    pub health: Option<Arc<HealthState>>,
}

impl WebhookState {
    pub fn new(webhook: ImmutableWebhook) -> Self {
        Self {
            webhook,
            health: None,
        }
    }

    pub fn with_health(mut self, health: Arc<HealthState>) -> Self {
        self.health = Some(health);
        self
    }
}

/// Create the webhook router
pub fn create_webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/validate-restore", post(validate_resource::<Restore>))
        .route("/validate-backup", post(validate_resource::<Backup>))
        .route("/validate-mariadb", post(validate_resource::<MariaDB>))
        .with_state(state)
}

/// Admission webhook handler for a tracked resource kind
pub async fn validate_resource<K>(
    State(state): State<Arc<WebhookState>>,
    Json(review): Json<AdmissionReview>,
) -> impl IntoResponse
where
    K: TrackedResource + Send + Sync + 'static,
{
    let request = match review.request {
        Some(req) => req,
        None => {
            error!("Admission review missing request");
            return (
                StatusCode::BAD_REQUEST,
                Json(create_response(
                    "",
                    &ValidationResult::invalid(
                        REASON_INVALID_OBJECT,
                        "Missing request in AdmissionReview",
                    ),
                )),
            );
        }
    };

    let uid = request.uid.clone();
    let resource = K::plural(&()).to_string();
    info!(
        uid = %uid,
        resource = %resource,
        operation = %request.operation,
        namespace = ?request.namespace,
        name = ?request.name,
        "Processing admission request"
    );

    let started = Instant::now();
    let result = admit::<K>(&state.webhook, &request);

    if let Some(health) = &state.health {
        health.metrics.record_admission(
            &resource,
            &request.operation,
            started.elapsed().as_secs_f64(),
        );
        if !result.allowed {
            health.metrics.record_denial(&resource, result.violations);
        }
        // Types may be resolved lazily on first use
        health
            .metrics
            .set_registered_schemas(state.webhook.registry().len());
    }

    if result.allowed {
        info!(uid = %uid, "Admission request allowed");
    } else {
        warn!(
            uid = %uid,
            code = result.code,
            reason = ?result.reason,
            message = ?result.message,
            "Admission request denied"
        );
    }

    (StatusCode::OK, Json(create_response(&uid, &result)))
}

/// Decide an admission request for resource kind `K`.
///
/// CREATE, DELETE and CONNECT are admitted without inspection. UPDATE
/// compares the old and new specs field by field.
pub fn admit<K: TrackedResource>(
    webhook: &ImmutableWebhook,
    request: &AdmissionRequest,
) -> ValidationResult {
    if request.operation != "UPDATE" {
        return ValidationResult::allowed();
    }

    let (new, old) = match decode_pair::<K>(request) {
        Ok(pair) => pair,
        Err(result) => return result,
    };

    webhook.validate_resource(&new, &old).into()
}

/// Decode `object` and `oldObject`, checking both are of kind `K`.
fn decode_pair<K: TrackedResource>(request: &AdmissionRequest) -> Result<(K, K), ValidationResult> {
    let (Some(object), Some(old_object)) = (&request.object, &request.old_object) else {
        return Err(ValidationResult::invalid(
            REASON_INVALID_OBJECT,
            "UPDATE requires both object and oldObject",
        ));
    };

    let expected = format!("{}, Kind={}", K::api_version(&()), K::kind(&()));
    for value in [object, old_object] {
        let found = type_meta(value);
        if found != expected {
            let err = ValidationError::TypeMismatch {
                expected: expected.clone(),
                found,
            };
            error!(uid = %request.uid, error = %err, "Admission request carries mismatched objects");
            return Err(ValidationResult::from(Err::<(), _>(err)));
        }
    }

    let decode = |value: &serde_json::Value, which: &str| {
        serde_json::from_value::<K>(value.clone()).map_err(|e| {
            error!(uid = %request.uid, error = %e, "Failed to parse {}", which);
            ValidationResult::invalid(
                REASON_INVALID_OBJECT,
                &format!("Failed to parse {}: {}", which, e),
            )
        })
    };

    Ok((decode(object, "object")?, decode(old_object, "oldObject")?))
}

/// `apiVersion, Kind=kind` of a raw object, empty parts when absent.
fn type_meta(value: &serde_json::Value) -> String {
    let field = |name: &str| value.get(name).and_then(|v| v.as_str()).unwrap_or_default();
    format!("{}, Kind={}", field("apiVersion"), field("kind"))
}

/// Create an AdmissionReview response
fn create_response(uid: &str, result: &ValidationResult) -> AdmissionReviewResponse {
    AdmissionReviewResponse {
        api_version: "admission.k8s.io/v1".to_string(),
        kind: "AdmissionReview".to_string(),
        response: AdmissionResponse {
            uid: uid.to_string(),
            allowed: result.allowed,
            status: if result.allowed {
                None
            } else {
                Some(AdmissionStatus {
                    code: i32::from(result.code),
                    message: result.message.clone().unwrap_or_default(),
                    reason: result.reason.clone(),
                })
            },
        },
    }
}

/// Default path to webhook TLS certificate
pub const WEBHOOK_CERT_PATH: &str = "/etc/webhook/certs/tls.crt";
/// Default path to webhook TLS private key
pub const WEBHOOK_KEY_PATH: &str = "/etc/webhook/certs/tls.key";
/// Default webhook server port
pub const WEBHOOK_PORT: u16 = 8443;

/// Webhook server settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookConfig {
    pub cert_path: String,
    pub key_path: String,
    pub port: u16,
    /// Annotation key field policies are read from
    pub policy_tag: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            cert_path: WEBHOOK_CERT_PATH.to_string(),
            key_path: WEBHOOK_KEY_PATH.to_string(),
            port: WEBHOOK_PORT,
            policy_tag: super::policies::immutability::POLICY_TAG.to_string(),
        }
    }
}

impl WebhookConfig {
    /// Defaults overridden by `WEBHOOK_CERT_PATH`, `WEBHOOK_KEY_PATH` and
    /// `WEBHOOK_POLICY_TAG` when set.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            cert_path: lookup("WEBHOOK_CERT_PATH").unwrap_or(defaults.cert_path),
            key_path: lookup("WEBHOOK_KEY_PATH").unwrap_or(defaults.key_path),
            port: defaults.port,
            policy_tag: lookup("WEBHOOK_POLICY_TAG")
                .filter(|tag| !tag.is_empty())
                .unwrap_or(defaults.policy_tag),
        }
    }
}

/// Run the webhook server with TLS
///
/// Binds to 0.0.0.0 on the configured port and serves the validation
/// endpoints. TLS certificates are loaded from the configured paths.
pub async fn run_webhook_server(
    state: Arc<WebhookState>,
    config: &WebhookConfig,
) -> Result<(), WebhookError> {
    use axum_server::tls_rustls::RustlsConfig;
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let app = create_webhook_router(state);

    let tls = RustlsConfig::from_pem_file(
        PathBuf::from(&config.cert_path),
        PathBuf::from(&config.key_path),
    )
    .await
    .map_err(|e| WebhookError::TlsConfig(e.to_string()))?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Webhook server listening on {} with TLS", addr);

    axum_server::bind_rustls(addr, tls)
        .serve(app.into_make_service())
        .await
        .map_err(|e| WebhookError::Server(e.to_string()))?;

    Ok(())
}

/// Errors that can occur when running the webhook server
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    #[error("Webhook server error: {0}")]
    Server(String),

    /// A resource spec declares an invalid policy
    #[error("Invalid resource schema: {0}")]
    Schema(#[from] SchemaError),
}
