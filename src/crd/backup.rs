//! Backup CRD: scheduled or one-off logical and physical backups.

use k8s_openapi::api::core::v1::{PersistentVolumeClaimSpec, ResourceRequirements};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::common::{MariaDbRef, RestartPolicy, VolumeSource};
use crate::webhooks::policies::immutability::{Schema, Tracked, TrackedResource};

/// Backup is the Schema for the backups API
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[kube(
    group = "mariadb.mmontes.io",
    version = "v1alpha1",
    kind = "Backup",
    plural = "backups",
    shortname = "bmdb",
    namespaced,
    printcolumn = r#"{"name":"MariaDB", "type":"string", "jsonPath":".spec.mariaDbRef.name"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct BackupSpec {
    /// MariaDB instance to back up
    pub maria_db_ref: MariaDbRef,

    /// Where backups are written
    pub storage: BackupStorage,

    /// Cron schedule; a single backup is taken when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<Schedule>,

    /// Days to keep backups, unlimited when zero
    #[serde(default)]
    pub max_retention_days: i32,

    /// Take a physical backup instead of a logical dump
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical: Option<bool>,

    /// Retries of the backup job before it is marked as failed
    #[serde(default = "default_backoff_limit")]
    pub backoff_limit: i32,

    /// Restart policy of the backup job pods
    #[serde(default)]
    pub restart_policy: RestartPolicy,

    /// Resource requirements of the backup job pods
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
}

fn default_backoff_limit() -> i32 {
    5
}

/// Backup storage, either a dedicated claim or an existing volume
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackupStorage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_volume_claim: Option<PersistentVolumeClaimSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<VolumeSource>,
}

/// Backup schedule
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    /// Cron expression
    pub cron: String,

    /// Pause scheduling without deleting the backup
    #[serde(default)]
    pub suspend: bool,
}

impl Tracked for BackupSpec {
    const TYPE_NAME: &'static str = "BackupSpec";

    fn schema() -> Schema<Self> {
        Schema::<Self>::new()
            .immutable("mariaDbRef", |s| &s.maria_db_ref)
            .immutable("storage", |s| &s.storage)
            .field("schedule", |s| &s.schedule)
            .field("maxRetentionDays", |s| &s.max_retention_days)
            .immutable("physical", |s| &s.physical)
            .field("backoffLimit", |s| &s.backoff_limit)
            .immutable("restartPolicy", |s| &s.restart_policy)
            .field("resources", |s| &s.resources)
    }
}

impl Tracked for BackupStorage {
    const TYPE_NAME: &'static str = "BackupStorage";

    fn schema() -> Schema<Self> {
        Schema::<Self>::new()
            .field("persistentVolumeClaim", |s| &s.persistent_volume_claim)
            .field("volume", |s| &s.volume)
    }
}

impl Tracked for Schedule {
    const TYPE_NAME: &'static str = "Schedule";

    fn schema() -> Schema<Self> {
        Schema::<Self>::new()
            .field("cron", |s| &s.cron)
            .field("suspend", |s| &s.suspend)
    }
}

impl TrackedResource for Backup {
    type Spec = BackupSpec;

    fn tracked_spec(&self) -> &BackupSpec {
        &self.spec
    }
}
