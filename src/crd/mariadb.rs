//! MariaDB CRD: a MariaDB server instance managed by the operator.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{EnvVar, ResourceRequirements};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::common::{Image, SecretKeySelector, Storage};
use crate::webhooks::policies::immutability::{Schema, Tracked, TrackedResource};

/// MariaDB is the Schema for the mariadbs API
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[kube(
    group = "mariadb.mmontes.io",
    version = "v1alpha1",
    kind = "MariaDB",
    plural = "mariadbs",
    shortname = "mdb",
    namespaced,
    printcolumn = r#"{"name":"Image", "type":"string", "jsonPath":".spec.image.repository"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct MariaDbSpec {
    /// Root password, fixed once the data directory is initialized
    pub root_password_secret_key_ref: SecretKeySelector,

    /// Initial database to create
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,

    /// Initial user to create
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Password of the initial user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_secret_key_ref: Option<SecretKeySelector>,

    pub image: Image,

    #[serde(default = "default_port")]
    pub port: i32,

    /// Data volume of each instance
    #[serde(rename = "volumeClaimTemplate")]
    pub storage: Storage,

    #[serde(default = "default_replicas")]
    pub replicas: i32,

    /// Contents of the `my.cnf` configuration file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub my_cnf: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,

    /// Extra labels for the instance pods
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub pod_labels: BTreeMap<String, String>,
}

fn default_port() -> i32 {
    3306
}

fn default_replicas() -> i32 {
    1
}

impl Tracked for MariaDbSpec {
    const TYPE_NAME: &'static str = "MariaDbSpec";

    fn schema() -> Schema<Self> {
        Schema::<Self>::new()
            .immutable("rootPasswordSecretKeyRef", |s| &s.root_password_secret_key_ref)
            .immutable_after_init("database", |s| &s.database)
            .immutable_after_init("username", |s| &s.username)
            .immutable_after_init("passwordSecretKeyRef", |s| &s.password_secret_key_ref)
            .field("image", |s| &s.image)
            .immutable("port", |s| &s.port)
            .immutable("volumeClaimTemplate", |s| &s.storage)
            .field("replicas", |s| &s.replicas)
            .immutable("myCnf", |s| &s.my_cnf)
            .field("resources", |s| &s.resources)
            .field("env", |s| &s.env)
            .field("podLabels", |s| &s.pod_labels)
    }
}

impl TrackedResource for MariaDB {
    type Spec = MariaDbSpec;

    fn tracked_spec(&self) -> &MariaDbSpec {
        &self.spec
    }
}
