pub mod crd;
pub mod health;
pub mod webhooks;

pub use crd::{Backup, MariaDB, Restore};
pub use health::{HEALTH_PORT, HealthState, Metrics, run_health_server};
pub use webhooks::{
    WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH, WEBHOOK_PORT, WebhookConfig, WebhookError, WebhookState,
    builtin_webhook, run_webhook_server,
};
