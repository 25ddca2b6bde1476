//! Types shared by the MariaDB operator custom resources.

use std::fmt;

use k8s_openapi::api::core::v1::{
    EmptyDirVolumeSource, HostPathVolumeSource, NFSVolumeSource, PersistentVolumeClaimVolumeSource,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::webhooks::policies::immutability::{Schema, Tracked};

/// Container image reference.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub repository: String,

    #[serde(default = "default_tag")]
    pub tag: String,

    #[serde(default)]
    pub pull_policy: PullPolicy,
}

fn default_tag() -> String {
    "latest".to_string()
}

impl fmt::Display for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository, self.tag)
    }
}

impl Tracked for Image {
    const TYPE_NAME: &'static str = "Image";

    fn schema() -> Schema<Self> {
        Schema::<Self>::new()
            .field("repository", |s| &s.repository)
            .field("tag", |s| &s.tag)
            .field("pullPolicy", |s| &s.pull_policy)
    }
}

/// Image pull policy
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, JsonSchema)]
pub enum PullPolicy {
    Always,
    #[default]
    IfNotPresent,
    Never,
}

/// Persistent storage for database pods.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Storage {
    /// Storage class of the volume claim
    pub class_name: String,

    /// Size of the persistent volume (e.g., "10Gi")
    pub size: String,

    /// Access modes, `ReadWriteOnce` when empty
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub access_modes: Vec<String>,
}

impl Storage {
    /// Access modes with the default applied.
    pub fn effective_access_modes(&self) -> Vec<String> {
        if self.access_modes.is_empty() {
            vec!["ReadWriteOnce".to_string()]
        } else {
            self.access_modes.clone()
        }
    }
}

impl Tracked for Storage {
    const TYPE_NAME: &'static str = "Storage";

    fn schema() -> Schema<Self> {
        Schema::<Self>::new()
            .field("className", |s| &s.class_name)
            .field("size", |s| &s.size)
            .field("accessModes", |s| &s.access_modes)
    }
}

/// Reference to an object in the same namespace.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
pub struct LocalObjectReference {
    pub name: String,
}

impl LocalObjectReference {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Tracked for LocalObjectReference {
    const TYPE_NAME: &'static str = "LocalObjectReference";

    fn schema() -> Schema<Self> {
        Schema::<Self>::new().field("name", |s| &s.name)
    }
}

/// Reference to the MariaDB instance a resource operates on.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MariaDbRef {
    #[serde(flatten)]
    pub object_ref: LocalObjectReference,

    /// Wait for the MariaDB instance to be ready before proceeding
    #[serde(default)]
    pub wait_for_it: bool,
}

impl MariaDbRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            object_ref: LocalObjectReference::new(name),
            wait_for_it: false,
        }
    }
}

impl Tracked for MariaDbRef {
    const TYPE_NAME: &'static str = "MariaDbRef";

    fn schema() -> Schema<Self> {
        Schema::<Self>::new()
            .inline("localObjectReference", |s| &s.object_ref)
            .field("waitForIt", |s| &s.wait_for_it)
    }
}

/// Key of a Secret in the same namespace.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
pub struct SecretKeySelector {
    pub name: String,
    pub key: String,
}

impl Tracked for SecretKeySelector {
    const TYPE_NAME: &'static str = "SecretKeySelector";

    fn schema() -> Schema<Self> {
        Schema::<Self>::new()
            .field("name", |s| &s.name)
            .field("key", |s| &s.key)
    }
}

/// Pod restart policy for job-backed resources
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, JsonSchema)]
pub enum RestartPolicy {
    Always,
    #[default]
    OnFailure,
    Never,
}

/// Volume holding backup files. Exactly one source is expected to be set.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nfs: Option<NFSVolumeSource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_volume_claim: Option<PersistentVolumeClaimVolumeSource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub empty_dir: Option<EmptyDirVolumeSource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_path: Option<HostPathVolumeSource>,
}

impl VolumeSource {
    pub fn nfs(server: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            nfs: Some(NFSVolumeSource {
                server: server.into(),
                path: path.into(),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    pub fn persistent_volume_claim(claim_name: impl Into<String>) -> Self {
        Self {
            persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                claim_name: claim_name.into(),
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

// Volume sources are compared as a whole.
crate::leaf_field_values!(PullPolicy, RestartPolicy, VolumeSource);
