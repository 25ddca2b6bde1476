// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic,
    clippy::string_slice
)]

//! Property-based tests for immutability validation
//!
//! These tests use proptest to generate random Restore specs and verify that:
//! 1. Comparing a spec with itself is always accepted
//! 2. Mutable fields can change freely
//! 3. Immutable fields reject any change, naming the field
//! 4. Init-once fields accept exactly the first transition from unset
//! 5. Every simultaneous violation is reported
//! 6. Validation is deterministic (same input = same output)

#[path = "../common/mod.rs"]
mod common;

use proptest::prelude::*;

use common::nfs_volume;
use mariadb_operator::crd::{
    LocalObjectReference, MariaDbRef, RestartPolicy, RestoreSource, RestoreSpec,
};
use mariadb_operator::webhooks::builtin_webhook;
use mariadb_operator::webhooks::policies::immutability::{
    ImmutableWebhook, POLICY_TAG, ValidationError,
};

// =============================================================================
// Helper functions
// =============================================================================

fn webhook() -> ImmutableWebhook {
    builtin_webhook(POLICY_TAG).unwrap()
}

fn violated_paths(result: Result<(), ValidationError>) -> Vec<String> {
    match result {
        Ok(()) => Vec::new(),
        Err(ValidationError::Aggregate(violations)) => violations.paths(),
        Err(other) => panic!("expected policy violations, got {other}"),
    }
}

// =============================================================================
// Strategy generators for Restore specs
// =============================================================================

fn name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,15}"
}

fn restart_policy() -> impl Strategy<Value = RestartPolicy> {
    prop_oneof![
        Just(RestartPolicy::Always),
        Just(RestartPolicy::OnFailure),
        Just(RestartPolicy::Never),
    ]
}

fn restore_source() -> impl Strategy<Value = RestoreSource> {
    (
        proptest::option::of(name()),
        proptest::option::of(name()),
        proptest::option::of(any::<bool>()),
        proptest::option::of(name()),
    )
        .prop_map(|(backup_ref, volume_path, physical, file_name)| RestoreSource {
            backup_ref: backup_ref.map(LocalObjectReference::new),
            volume: volume_path.map(|path| nfs_volume("nas.local", &format!("/volume/{path}"))),
            physical,
            file_name,
        })
}

fn restore_spec() -> impl Strategy<Value = RestoreSpec> {
    (
        restore_source(),
        name(),
        any::<bool>(),
        0..100i32,
        restart_policy(),
    )
        .prop_map(
            |(restore_source, maria_db, wait_for_it, backoff_limit, restart_policy)| RestoreSpec {
                restore_source,
                maria_db_ref: MariaDbRef {
                    wait_for_it,
                    ..MariaDbRef::new(maria_db)
                },
                backoff_limit,
                restart_policy,
                resources: None,
            },
        )
}

// =============================================================================
// Property tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: An unchanged spec is always accepted
    #[test]
    fn prop_identical_specs_are_accepted(spec in restore_spec()) {
        let result = webhook().validate_update(&spec, &spec.clone());
        prop_assert!(result.is_ok(), "Unchanged spec should be accepted: {:?}", result);
    }

    /// Property: Changing only mutable fields never produces a violation
    #[test]
    fn prop_mutable_fields_are_unconstrained(
        spec in restore_spec(),
        backoff_limit in 0..100i32,
        wait_for_it in any::<bool>(),
    ) {
        let mut new = spec.clone();
        new.backoff_limit = backoff_limit;
        let result = webhook().validate_update(&new, &spec);
        prop_assert!(result.is_ok(), "Mutable change should be accepted: {:?}", result);

        // waitForIt is mutable, but it lives inside the immutable mariaDbRef
        new.maria_db_ref.wait_for_it = wait_for_it;
        let paths = violated_paths(webhook().validate_update(&new, &spec));
        prop_assert_eq!(
            paths.is_empty(),
            wait_for_it == spec.maria_db_ref.wait_for_it
        );
    }

    /// Property: Immutable fields reject any change and accept equal values
    #[test]
    fn prop_immutable_fields_reject_changes(
        spec in restore_spec(),
        restart_policy in restart_policy(),
    ) {
        let mut new = spec.clone();
        new.restart_policy = restart_policy;
        let paths = violated_paths(webhook().validate_update(&new, &spec));
        if restart_policy == spec.restart_policy {
            prop_assert!(paths.is_empty());
        } else {
            prop_assert_eq!(paths, vec!["spec.restartPolicy".to_string()]);
        }
    }

    /// Property: Init-once fields accept the first set, then reject changes
    #[test]
    fn prop_init_once_fields_allow_one_transition(
        old_physical in proptest::option::of(any::<bool>()),
        new_physical in proptest::option::of(any::<bool>()),
    ) {
        let old = RestoreSpec {
            restore_source: RestoreSource {
                physical: old_physical,
                ..Default::default()
            },
            ..Default::default()
        };
        let new = RestoreSpec {
            restore_source: RestoreSource {
                physical: new_physical,
                ..Default::default()
            },
            ..Default::default()
        };

        let paths = violated_paths(webhook().validate_update(&new, &old));
        let expect_violation = old_physical.is_some() && old_physical != new_physical;
        if expect_violation {
            prop_assert_eq!(paths, vec!["spec.physical".to_string()]);
        } else {
            prop_assert!(paths.is_empty());
        }
    }

    /// Property: Every simultaneously violated field is reported
    #[test]
    fn prop_all_violations_are_reported(
        spec in restore_spec(),
        other in restore_spec(),
    ) {
        let paths = violated_paths(webhook().validate_update(&other, &spec));
        let old = &spec.restore_source;
        let new = &other.restore_source;

        let init_once_breached = |set: bool, equal: bool| set && !equal;
        let mut expected = Vec::new();
        if init_once_breached(old.backup_ref.is_some(), old.backup_ref == new.backup_ref) {
            expected.push("spec.backupRef");
        }
        if init_once_breached(old.volume.is_some(), old.volume == new.volume) {
            expected.push("spec.volume");
        }
        if init_once_breached(old.physical.is_some(), old.physical == new.physical) {
            expected.push("spec.physical");
        }
        if init_once_breached(old.file_name.is_some(), old.file_name == new.file_name) {
            expected.push("spec.fileName");
        }
        if spec.maria_db_ref != other.maria_db_ref {
            expected.push("spec.mariaDbRef");
        }
        if spec.restart_policy != other.restart_policy {
            expected.push("spec.restartPolicy");
        }

        prop_assert_eq!(paths, expected);
    }

    /// Property: Validation is deterministic
    #[test]
    fn prop_validation_is_deterministic(
        spec in restore_spec(),
        other in restore_spec(),
    ) {
        let webhook = webhook();
        let first = webhook.validate_update(&other, &spec);
        let second = webhook.validate_update(&other, &spec);
        prop_assert_eq!(first, second);
    }
}
