mod backup;
mod common;
mod mariadb;
mod restore;

pub use backup::*;
pub use common::*;
pub use mariadb::*;
pub use restore::*;

use k8s_openapi::api::core::v1::{EnvVar, PersistentVolumeClaimSpec, ResourceRequirements};

// Kubernetes core types are compared as a whole.
crate::leaf_field_values!(
    PersistentVolumeClaimSpec,
    ResourceRequirements,
    EnvVar,
);
