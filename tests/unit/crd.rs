//! Unit tests for the CRD wire format

use mariadb_operator::crd::{Backup, MariaDB, RestartPolicy, Restore};
use kube::{CustomResourceExt, Resource};
use serde_json::json;

use crate::common::*;

#[test]
fn test_restore_source_is_embedded_in_spec() {
    let restore = RestoreBuilder::new("test", "default")
        .with_backup_ref("backup")
        .with_physical(true)
        .build();
    let wire = to_wire(&restore);

    assert_eq!(wire["apiVersion"], "mariadb.mmontes.io/v1alpha1");
    assert_eq!(wire["kind"], "Restore");
    assert_eq!(wire["spec"]["backupRef"]["name"], "backup");
    assert_eq!(wire["spec"]["physical"], true);
    assert_eq!(wire["spec"]["mariaDbRef"]["name"], "mariadb");
    assert!(wire["spec"].get("restoreSource").is_none());
    assert!(wire["spec"].get("volume").is_none());
}

#[test]
fn test_restore_round_trips_through_wire_format() {
    let restore = RestoreBuilder::new("test", "default")
        .with_backup_ref("backup")
        .with_nfs_volume("nas.local", "/volume/foo")
        .with_restart_policy(RestartPolicy::Never)
        .build();
    let decoded: Restore = serde_json::from_value(to_wire(&restore)).unwrap();
    assert_eq!(decoded.spec, restore.spec);
}

#[test]
fn test_restore_defaults() {
    let restore: Restore = serde_json::from_value(json!({
        "apiVersion": "mariadb.mmontes.io/v1alpha1",
        "kind": "Restore",
        "metadata": {"name": "test"},
        "spec": {"mariaDbRef": {"name": "mariadb", "waitForIt": true}}
    }))
    .unwrap();
    assert_eq!(restore.spec.backoff_limit, 5);
    assert_eq!(restore.spec.restart_policy, RestartPolicy::OnFailure);
    assert!(restore.spec.maria_db_ref.wait_for_it);
    assert!(restore.spec.restore_source.backup_ref.is_none());
}

#[test]
fn test_mariadb_storage_uses_volume_claim_template_key() {
    let mariadb = create_test_mariadb("mariadb", "default");
    let wire = to_wire(&mariadb);
    assert_eq!(wire["spec"]["volumeClaimTemplate"]["size"], "1Gi");
    assert_eq!(wire["spec"]["port"], 3306);
}

#[test]
fn test_resource_identities() {
    assert_eq!(Restore::kind(&()), "Restore");
    assert_eq!(Backup::plural(&()), "backups");
    assert_eq!(MariaDB::kind(&()), "MariaDB");
    assert_eq!(MariaDB::group(&()), "mariadb.mmontes.io");

    let crd = Restore::crd();
    assert_eq!(crd.spec.names.kind, "Restore");
    assert!(crd.spec.versions.iter().any(|v| v.name == "v1alpha1"));
}
