//! Health server for Kubernetes probes and Prometheus metrics
//!
//! Provides HTTP endpoints for:
//! - `/healthz` - Liveness probe (is the process alive?)
//! - `/readyz` - Readiness probe (are schemas registered and the webhook serving?)
//! - `/metrics` - Prometheus metrics

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;

/// Health server port
pub const HEALTH_PORT: u16 = 8080;

/// Labels for per-request admission metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct AdmissionLabels {
    pub resource: String,
    pub operation: String,
}

impl prometheus_client::encoding::EncodeLabelSet for AdmissionLabels {
    fn encode(
        &self,
        mut encoder: prometheus_client::encoding::LabelSetEncoder<'_>,
    ) -> Result<(), std::fmt::Error> {
        use prometheus_client::encoding::EncodeLabel;
        ("resource", self.resource.as_str()).encode(encoder.encode_label())?;
        ("operation", self.operation.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Labels for per-resource metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct ResourceLabels {
    pub resource: String,
}

impl prometheus_client::encoding::EncodeLabelSet for ResourceLabels {
    fn encode(
        &self,
        mut encoder: prometheus_client::encoding::LabelSetEncoder<'_>,
    ) -> Result<(), std::fmt::Error> {
        use prometheus_client::encoding::EncodeLabel;
        ("resource", self.resource.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Shared metrics state
pub struct Metrics {
    /// Admission requests received
    pub admission_requests_total: Family<AdmissionLabels, Counter>,
    /// Admission requests denied
    pub admission_denials_total: Family<ResourceLabels, Counter>,
    /// Field policy violations found in denied updates
    pub policy_violations_total: Family<ResourceLabels, Counter>,
    /// Admission decision duration histogram
    pub admission_duration_seconds: Family<AdmissionLabels, Histogram>,
    /// Number of types with a resolved schema
    pub registered_schemas: Gauge,

    /// Prometheus registry
    registry: Registry,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let admission_requests_total = Family::<AdmissionLabels, Counter>::default();
        registry.register(
            "mariadb_operator_admission_requests",
            "Total number of admission requests",
            admission_requests_total.clone(),
        );

        let admission_denials_total = Family::<ResourceLabels, Counter>::default();
        registry.register(
            "mariadb_operator_admission_denials",
            "Total number of denied admission requests",
            admission_denials_total.clone(),
        );

        let policy_violations_total = Family::<ResourceLabels, Counter>::default();
        registry.register(
            "mariadb_operator_policy_violations",
            "Total number of field policy violations",
            policy_violations_total.clone(),
        );

        let admission_duration_seconds =
            Family::<AdmissionLabels, Histogram>::new_with_constructor(|| {
                Histogram::new(exponential_buckets(0.0001, 2.0, 15))
            });
        registry.register(
            "mariadb_operator_admission_duration_seconds",
            "Duration of admission decisions in seconds",
            admission_duration_seconds.clone(),
        );

        let registered_schemas = Gauge::default();
        registry.register(
            "mariadb_operator_registered_schemas",
            "Number of types with a resolved field policy schema",
            registered_schemas.clone(),
        );

        Self {
            admission_requests_total,
            admission_denials_total,
            policy_violations_total,
            admission_duration_seconds,
            registered_schemas,
            registry,
        }
    }

    /// Record a decided admission request
    pub fn record_admission(&self, resource: &str, operation: &str, duration_secs: f64) {
        let labels = AdmissionLabels {
            resource: resource.to_string(),
            operation: operation.to_string(),
        };
        self.admission_requests_total.get_or_create(&labels).inc();
        self.admission_duration_seconds
            .get_or_create(&labels)
            .observe(duration_secs);
    }

    /// Record a denied admission request and the violations behind it
    pub fn record_denial(&self, resource: &str, violations: usize) {
        let labels = ResourceLabels {
            resource: resource.to_string(),
        };
        self.admission_denials_total.get_or_create(&labels).inc();
        self.policy_violations_total
            .get_or_create(&labels)
            .inc_by(violations as u64);
    }

    pub fn set_registered_schemas(&self, count: usize) {
        self.registered_schemas
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    /// Encode metrics to Prometheus text format
    ///
    /// Returns an empty string if encoding fails (should never happen with valid metrics).
    fn encode(&self) -> String {
        let mut buffer = String::new();
        if let Err(e) = encode(&mut buffer, &self.registry) {
            tracing::error!("Failed to encode metrics: {}", e);
            return String::new();
        }
        buffer
    }
}

/// Shared state for the health server
pub struct HealthState {
    /// Whether the webhook is ready to admit requests
    pub ready: RwLock<bool>,
    /// Metrics registry
    pub metrics: Metrics,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    pub fn new() -> Self {
        Self {
            ready: RwLock::new(false),
            metrics: Metrics::new(),
        }
    }

    /// Mark the webhook as ready
    pub async fn set_ready(&self, ready: bool) {
        *self.ready.write().await = ready;
    }

    /// Check if the webhook is ready
    pub async fn is_ready(&self) -> bool {
        *self.ready.read().await
    }
}

/// Liveness probe handler
///
/// Returns 200 OK if the process is alive.
async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Readiness probe handler
///
/// Returns 200 OK once schemas are registered and the webhook is serving.
/// Returns 503 Service Unavailable otherwise.
async fn readyz(State(state): State<Arc<HealthState>>) -> Response {
    if state.is_ready().await {
        (StatusCode::OK, "ready").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready").into_response()
    }
}

/// Metrics handler
///
/// Returns Prometheus-formatted metrics.
async fn metrics(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let body = state.metrics.encode();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

/// Create the health server router
pub fn create_router(state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Run the health server
///
/// Binds to 0.0.0.0:8080 and serves health/metrics endpoints.
pub async fn run_health_server(state: Arc<HealthState>) -> Result<(), std::io::Error> {
    let app = create_router(state);

    let listener = TcpListener::bind(("0.0.0.0", HEALTH_PORT)).await?;
    tracing::info!("Health server listening on 0.0.0.0:{}", HEALTH_PORT);

    axum::serve(listener, app).await
}
