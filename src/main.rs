use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tracing::{error, info};

use mariadb_operator::health::{HealthState, run_health_server};
use mariadb_operator::{
    WebhookConfig, WebhookError, WebhookState, builtin_webhook, run_webhook_server,
};

/// Grace period for in-flight admission requests to complete during shutdown
const SHUTDOWN_GRACE_PERIOD_SECS: u64 = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install the TLS crypto provider before any TLS operations
    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
        && rustls::crypto::CryptoProvider::get_default().is_none()
    {
        return Err(
            "Failed to install rustls crypto provider and no provider is available".into(),
        );
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mariadb_operator=info".parse()?),
        )
        .init();

    info!("Starting mariadb-operator admission webhook");

    let config = WebhookConfig::from_env();

    // Resolve every resource schema up front so a bad declaration stops startup
    let webhook = builtin_webhook(&config.policy_tag)
        .map_err(WebhookError::from)
        .inspect_err(|e| error!(error = %e, "Invalid field policy declaration"))?;
    info!(
        policy_tag = %config.policy_tag,
        schemas = webhook.registry().len(),
        "Registered resource schemas"
    );

    let health_state = Arc::new(HealthState::new());
    health_state
        .metrics
        .set_registered_schemas(webhook.registry().len());

    // Start health server immediately so liveness probes pass during startup
    let health_handle = {
        let health_state = health_state.clone();
        tokio::spawn(async move {
            if let Err(e) = run_health_server(health_state).await {
                error!("Health server error: {}", e);
            }
        })
    };

    if !Path::new(&config.cert_path).exists() || !Path::new(&config.key_path).exists() {
        error!(
            "TLS certificates not found at {} and {}",
            config.cert_path, config.key_path
        );
        return Err("webhook TLS certificates are missing".into());
    }

    let webhook_handle = {
        let state = Arc::new(WebhookState::new(webhook).with_health(health_state.clone()));
        let config = config.clone();
        tokio::spawn(async move {
            if let Err(e) = run_webhook_server(state, &config).await {
                error!("Webhook server error: {}", e);
            }
        })
    };

    health_state.set_ready(true).await;
    info!("Admission webhook ready");

    // Wait for any server to exit, or a shutdown signal
    tokio::select! {
        result = health_handle => {
            if let Err(e) = result {
                error!("Health server task panicked: {}", e);
            }
        }
        result = webhook_handle => {
            if let Err(e) = result {
                error!("Webhook server task panicked: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Received shutdown signal, initiating graceful shutdown...");

            // Mark as not ready so the API server stops routing requests here
            health_state.set_ready(false).await;
            info!("Marked webhook as not ready");

            info!(
                "Waiting {}s for in-flight admission requests to complete...",
                SHUTDOWN_GRACE_PERIOD_SECS
            );
            tokio::time::sleep(Duration::from_secs(SHUTDOWN_GRACE_PERIOD_SECS)).await;

            info!("Grace period complete, shutting down");
        }
    }

    info!("Webhook stopped");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
