//! Restore CRD: restores a MariaDB instance from a backup or a volume.

use k8s_openapi::api::core::v1::ResourceRequirements;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::common::{LocalObjectReference, MariaDbRef, RestartPolicy, VolumeSource};
use crate::webhooks::policies::immutability::{Schema, Tracked, TrackedResource};

/// Restore is the Schema for the restores API
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[kube(
    group = "mariadb.mmontes.io",
    version = "v1alpha1",
    kind = "Restore",
    plural = "restores",
    shortname = "rmdb",
    namespaced,
    printcolumn = r#"{"name":"MariaDB", "type":"string", "jsonPath":".spec.mariaDbRef.name"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct RestoreSpec {
    /// Where to restore from. Embedded in the spec on the wire.
    #[serde(flatten)]
    pub restore_source: RestoreSource,

    /// MariaDB instance to restore into
    pub maria_db_ref: MariaDbRef,

    /// Retries of the restore job before it is marked as failed
    #[serde(default = "default_backoff_limit")]
    pub backoff_limit: i32,

    /// Restart policy of the restore job pods
    #[serde(default)]
    pub restart_policy: RestartPolicy,

    /// Resource requirements of the restore job pods
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
}

fn default_backoff_limit() -> i32 {
    5
}

/// Source of a restore. Each field may be set once, typically by the
/// controller resolving a backup reference into a volume.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RestoreSource {
    /// Backup to restore from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_ref: Option<LocalObjectReference>,

    /// Volume holding the backup files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<VolumeSource>,

    /// Whether the backup is a physical one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical: Option<bool>,

    /// Backup file to restore, relative to the volume root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

impl RestoreSource {
    /// Whether the source has been resolved to something restorable.
    pub fn is_initialized(&self) -> bool {
        self.volume.is_some() && self.physical.is_some()
    }
}

impl Tracked for RestoreSpec {
    const TYPE_NAME: &'static str = "RestoreSpec";

    fn schema() -> Schema<Self> {
        Schema::<Self>::new()
            .inline("restoreSource", |s| &s.restore_source)
            .immutable("mariaDbRef", |s| &s.maria_db_ref)
            .field("backoffLimit", |s| &s.backoff_limit)
            .immutable("restartPolicy", |s| &s.restart_policy)
            .field("resources", |s| &s.resources)
    }
}

impl Tracked for RestoreSource {
    const TYPE_NAME: &'static str = "RestoreSource";

    fn schema() -> Schema<Self> {
        Schema::<Self>::new()
            .immutable_after_init("backupRef", |s| &s.backup_ref)
            .immutable_after_init("volume", |s| &s.volume)
            .immutable_after_init("physical", |s| &s.physical)
            .immutable_after_init("fileName", |s| &s.file_name)
    }
}

impl TrackedResource for Restore {
    type Spec = RestoreSpec;

    fn tracked_spec(&self) -> &RestoreSpec {
        &self.spec
    }
}
