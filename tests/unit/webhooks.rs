//! Unit tests for the admission webhook HTTP handlers
//!
//! Handlers are invoked directly with axum extractors, the way the router
//! calls them, and their JSON responses are inspected.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use mariadb_operator::crd::{Backup, MariaDB, RestartPolicy, Restore};
use mariadb_operator::health::HealthState;
use mariadb_operator::webhooks::policies::immutability::{ImmutableWebhook, POLICY_TAG};
use mariadb_operator::webhooks::{AdmissionReview, WebhookState, builtin_webhook, validate_resource};
use mariadb_operator::webhooks::policies::TrackedResource;
use serde_json::json;

use crate::common::*;

// =============================================================================
// Helper Functions
// =============================================================================

fn state() -> Arc<WebhookState> {
    Arc::new(WebhookState::new(builtin_webhook(POLICY_TAG).unwrap()))
}

async fn call<K>(state: Arc<WebhookState>, review: serde_json::Value) -> (StatusCode, serde_json::Value)
where
    K: TrackedResource + Send + Sync + 'static,
{
    let review: AdmissionReview = serde_json::from_value(review).unwrap();
    let response = validate_resource::<K>(State(state), Json(review))
        .await
        .into_response();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

// =============================================================================
// Operations
// =============================================================================

#[tokio::test]
async fn test_update_with_mutable_change_is_allowed() {
    let old = RestoreBuilder::new("test", "default")
        .with_backup_ref("backup")
        .with_backoff_limit(10)
        .build();
    let new = RestoreBuilder::new("test", "default")
        .with_backup_ref("backup")
        .with_backoff_limit(20)
        .build();

    let (status, body) = call::<Restore>(
        state(),
        admission_review("UPDATE", Some(&new), Some(&old)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["apiVersion"], "admission.k8s.io/v1");
    assert_eq!(body["kind"], "AdmissionReview");
    assert_eq!(body["response"]["uid"], "705ab4f5-6393-11e8-b7cc-42010a800002");
    assert_eq!(body["response"]["allowed"], true);
    assert!(body["response"].get("status").is_none());
}

#[tokio::test]
async fn test_update_with_immutable_change_is_denied() {
    let old = RestoreBuilder::new("test", "default")
        .with_restart_policy(RestartPolicy::Never)
        .with_physical(true)
        .build();
    let new = RestoreBuilder::new("test", "default")
        .with_restart_policy(RestartPolicy::Always)
        .with_physical(false)
        .build();

    let (status, body) = call::<Restore>(
        state(),
        admission_review("UPDATE", Some(&new), Some(&old)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let response = &body["response"];
    assert_eq!(response["allowed"], false);
    assert_eq!(response["status"]["code"], 403);
    assert_eq!(response["status"]["reason"], "FieldImmutable");
    let message = response["status"]["message"].as_str().unwrap();
    assert!(message.contains("spec.physical: field is immutable after initialization"));
    assert!(message.contains("spec.restartPolicy: field is immutable"));
}

#[tokio::test]
async fn test_create_and_delete_skip_validation() {
    let restore = create_test_restore("test", "default");

    let (_, body) = call::<Restore>(state(), admission_review("CREATE", Some(&restore), None)).await;
    assert_eq!(body["response"]["allowed"], true);

    let (_, body) = call::<Restore>(state(), admission_review("DELETE", None, Some(&restore))).await;
    assert_eq!(body["response"]["allowed"], true);
}

#[tokio::test]
async fn test_controller_resolving_backup_is_allowed() {
    let old = RestoreBuilder::new("test", "default")
        .with_backup_ref("backup")
        .build();
    let new = RestoreBuilder::new("test", "default")
        .with_backup_ref("backup")
        .with_nfs_volume("nas.local", "/volume/foo")
        .with_physical(true)
        .with_file_name("backup.2023-01-01.sql")
        .build();

    let (_, body) = call::<Restore>(
        state(),
        admission_review("UPDATE", Some(&new), Some(&old)),
    )
    .await;
    assert_eq!(body["response"]["allowed"], true);
}

#[tokio::test]
async fn test_backup_and_mariadb_routes() {
    let old = create_test_backup("backup", "default");
    let new = BackupBuilder::new("backup", "default")
        .with_schedule("*/5 * * * *")
        .with_restart_policy(RestartPolicy::Never)
        .build();
    let (_, body) = call::<Backup>(
        state(),
        admission_review("UPDATE", Some(&new), Some(&old)),
    )
    .await;
    assert_eq!(body["response"]["allowed"], false);
    assert!(
        body["response"]["status"]["message"]
            .as_str()
            .unwrap()
            .contains("spec.restartPolicy")
    );

    let old = create_test_mariadb("mariadb", "default");
    let new = MariaDbBuilder::new("mariadb", "default")
        .with_replicas(3)
        .build();
    let (_, body) = call::<MariaDB>(
        state(),
        admission_review("UPDATE", Some(&new), Some(&old)),
    )
    .await;
    assert_eq!(body["response"]["allowed"], true);
}

// =============================================================================
// Malformed Requests
// =============================================================================

#[tokio::test]
async fn test_missing_request_is_bad_request() {
    let review = json!({
        "apiVersion": "admission.k8s.io/v1",
        "kind": "AdmissionReview",
    });
    let (status, body) = call::<Restore>(state(), review).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["response"]["allowed"], false);
}

#[tokio::test]
async fn test_update_without_old_object_is_invalid() {
    let restore = create_test_restore("test", "default");
    let (status, body) = call::<Restore>(
        state(),
        admission_review("UPDATE", Some(&restore), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"]["allowed"], false);
    assert_eq!(body["response"]["status"]["code"], 400);
    assert_eq!(body["response"]["status"]["reason"], "InvalidObject");
}

#[tokio::test]
async fn test_mismatched_kinds_are_internal_errors() {
    let restore = create_test_restore("test", "default");
    let mut review = admission_review("UPDATE", Some(&restore), Some(&restore));
    review["request"]["oldObject"]["kind"] = json!("Backup");

    let (_, body) = call::<Restore>(state(), review).await;
    let response = &body["response"];
    assert_eq!(response["allowed"], false);
    assert_eq!(response["status"]["code"], 500);
    assert_eq!(response["status"]["reason"], "InternalError");
    assert!(!response["status"]["message"].as_str().unwrap().contains("Backup"));
}

// =============================================================================
// Metrics
// =============================================================================

#[tokio::test]
async fn test_denials_are_recorded() {
    let health = Arc::new(HealthState::new());
    let state = Arc::new(
        WebhookState::new(builtin_webhook(POLICY_TAG).unwrap()).with_health(health.clone()),
    );

    let old = RestoreBuilder::new("test", "default")
        .with_backup_ref("foo")
        .with_maria_db("mariadb")
        .build();
    let new = RestoreBuilder::new("test", "default")
        .with_backup_ref("bar")
        .with_maria_db("other")
        .build();
    let (_, body) = call::<Restore>(
        state,
        admission_review("UPDATE", Some(&new), Some(&old)),
    )
    .await;
    assert_eq!(body["response"]["allowed"], false);

    let labels = mariadb_operator::health::ResourceLabels {
        resource: "restores".to_string(),
    };
    assert_eq!(
        health
            .metrics
            .admission_denials_total
            .get_or_create(&labels)
            .get(),
        1
    );
    assert_eq!(
        health
            .metrics
            .policy_violations_total
            .get_or_create(&labels)
            .get(),
        2
    );
}

#[tokio::test]
async fn test_registered_schemas_gauge_tracks_lazy_resolution() {
    let health = Arc::new(HealthState::new());
    let state = Arc::new(WebhookState::new(ImmutableWebhook::new()).with_health(health.clone()));
    assert!(state.webhook.registry().is_empty());

    let old = RestoreBuilder::new("test", "default")
        .with_backup_ref("foo")
        .build();
    let (_, body) = call::<Restore>(
        state.clone(),
        admission_review("UPDATE", Some(&old), Some(&old)),
    )
    .await;
    assert_eq!(body["response"]["allowed"], true);

    let resolved = state.webhook.registry().len();
    assert!(resolved > 0);
    assert_eq!(health.metrics.registered_schemas.get(), resolved as i64);
}
