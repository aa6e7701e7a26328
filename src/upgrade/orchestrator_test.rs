//! Tests for the fleet upgrade pass

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;
use crate::crd::{JaegerSpec, LABEL_OPERATED_BY};
use crate::options::Options;
use crate::server::shutdown_channel;
use crate::upgrade::flags::{migrate_all_options, FlagMigration};
use crate::upgrade::registry::MigrateFn;
use crate::upgrade::store::{MockFailure, MockJaegerStore};
use std::collections::BTreeMap;

const OPERATOR: &str = "observability.jaeger-operator";

fn noop(jaeger: Jaeger) -> Result<Jaeger, MigrationError> {
    Ok(jaeger)
}

fn rename_host_port(mut jaeger: Jaeger) -> Result<Jaeger, MigrationError> {
    migrate_all_options(
        &mut jaeger,
        &[FlagMigration::rename(
            "collector.host-port",
            "reporter.tchannel.host-port",
        )],
    )?;
    Ok(jaeger)
}

fn set_log_level(mut jaeger: Jaeger) -> Result<Jaeger, MigrationError> {
    jaeger.spec.collector.options.insert("log-level", "info");
    Ok(jaeger)
}

fn always_fails(_: Jaeger) -> Result<Jaeger, MigrationError> {
    Err(MigrationError::Failed("storage backend no longer supported".to_string()))
}

fn test_registry() -> Arc<Registry> {
    Arc::new(
        Registry::build([
            ("1.14.0", noop as MigrateFn),
            ("1.15.0", rename_host_port as MigrateFn),
            ("1.16.0", set_log_level as MigrateFn),
        ])
        .unwrap(),
    )
}

fn failing_registry() -> Arc<Registry> {
    Arc::new(
        Registry::build([
            ("1.14.0", noop as MigrateFn),
            ("1.15.0", rename_host_port as MigrateFn),
            ("1.16.0", always_fails as MigrateFn),
            ("1.17.0", set_log_level as MigrateFn),
        ])
        .unwrap(),
    )
}

fn jaeger(name: &str, version: &str, owner: Option<&str>) -> Jaeger {
    let mut jaeger = Jaeger::new(name, JaegerSpec::default());
    jaeger.metadata.namespace = Some("observability".to_string());
    if let Some(owner) = owner {
        jaeger.metadata.labels = Some(BTreeMap::from([(
            LABEL_OPERATED_BY.to_string(),
            owner.to_string(),
        )]));
    }
    jaeger.spec.agent.options =
        Options::decode(br#"{"collector":{"host-port":"collector:14267"}}"#).unwrap();
    if !version.is_empty() {
        jaeger.set_recorded_version(version);
    }
    jaeger
}

/// Test: the chain runs from just after the recorded version to the latest
#[test]
fn test_migrate_instance_applies_chain() {
    let registry = test_registry();
    let original = jaeger("tracing", "1.14.0", None);

    let migrated = migrate_instance(&registry, &original);

    assert!(migrated.failure.is_none());
    assert_eq!(migrated.jaeger.recorded_version(), "1.16.0");
    let agent = &migrated.jaeger.spec.agent.options;
    assert_eq!(
        agent.get("reporter.tchannel.host-port"),
        Some("collector:14267")
    );
    assert!(!agent.contains_key("collector.host-port"));
    assert_eq!(
        migrated.jaeger.spec.collector.options.get("log-level"),
        Some("info")
    );
}

/// Test: a single-step chain ends at that step's version
#[test]
fn test_migrate_instance_single_step() {
    let registry = Registry::build([
        ("1.14.0", noop as MigrateFn),
        ("1.15.0", rename_host_port as MigrateFn),
    ])
    .unwrap();
    let original = jaeger("tracing", "1.14.0", None);

    let migrated = migrate_instance(&registry, &original);

    assert_eq!(migrated.jaeger.recorded_version(), "1.15.0");
    assert!(migrated
        .jaeger
        .spec
        .agent
        .options
        .contains_key("reporter.tchannel.host-port"));
    assert!(!migrated
        .jaeger
        .spec
        .agent
        .options
        .contains_key("collector.host-port"));
}

#[test]
fn test_migrate_instance_at_latest_is_unchanged() {
    let registry = test_registry();
    let original = jaeger("tracing", "1.16.0", None);

    let migrated = migrate_instance(&registry, &original);

    assert!(migrated.failure.is_none());
    assert_eq!(migrated.jaeger, original);
}

/// Test: a failing step keeps the last good version and its changes
#[test]
fn test_migrate_instance_stops_at_failure() {
    let registry = failing_registry();
    let original = jaeger("tracing", "1.14.0", None);

    let migrated = migrate_instance(&registry, &original);

    let failure = migrated.failure.expect("step 1.16.0 should fail");
    assert_eq!(failure.target.to_string(), "1.16.0");
    assert_eq!(migrated.jaeger.recorded_version(), "1.15.0");
    assert!(migrated
        .jaeger
        .spec
        .agent
        .options
        .contains_key("reporter.tchannel.host-port"));
    assert!(migrated.jaeger.spec.collector.options.is_empty());
}

/// Test: an instance at an unregistered version is left alone byte-for-byte
#[tokio::test]
async fn test_run_leaves_unknown_version_untouched() {
    let original = jaeger("legacy", "1.10.0", None);
    let before = serde_json::to_vec(&original).unwrap();
    let store = MockJaegerStore::new(vec![original]);

    let summary = Upgrader::new(test_registry(), OPERATOR)
        .run(&store)
        .await
        .unwrap();

    assert_eq!(summary.unchanged, 1);
    assert!(store.updates().is_empty());
    let after = serde_json::to_vec(&store.stored("legacy").unwrap()).unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_run_leaves_unversioned_instance_untouched() {
    let store = MockJaegerStore::new(vec![jaeger("fresh", "", None)]);

    let summary = Upgrader::new(test_registry(), OPERATOR)
        .run(&store)
        .await
        .unwrap();

    assert_eq!(summary.unchanged, 1);
    assert!(store.updates().is_empty());
}

/// Test: only instances owned by this operator (or unowned) are upgraded
#[tokio::test]
async fn test_run_respects_ownership() {
    let store = MockJaegerStore::new(vec![
        jaeger("ours", "1.14.0", Some(OPERATOR)),
        jaeger("theirs", "1.14.0", Some("other-namespace.jaeger-operator")),
        jaeger("unlabeled", "1.14.0", None),
    ]);

    let summary = Upgrader::new(test_registry(), OPERATOR)
        .run(&store)
        .await
        .unwrap();

    assert_eq!(summary.listed, 3);
    assert_eq!(summary.upgraded, 2);
    assert_eq!(summary.skipped, 1);
    assert_eq!(store.stored("ours").unwrap().recorded_version(), "1.16.0");
    assert_eq!(store.stored("unlabeled").unwrap().recorded_version(), "1.16.0");
    assert_eq!(store.stored("theirs").unwrap().recorded_version(), "1.14.0");
}

#[tokio::test]
async fn test_run_writes_only_changed_instances() {
    let store = MockJaegerStore::new(vec![
        jaeger("current", "1.16.0", None),
        jaeger("old", "1.14.0", None),
    ]);

    let summary = Upgrader::new(test_registry(), OPERATOR)
        .run(&store)
        .await
        .unwrap();

    assert_eq!(summary.upgraded, 1);
    assert_eq!(summary.unchanged, 1);
    let updates = store.updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].metadata.name.as_deref(), Some("old"));
}

/// Test: a stalled instance is stored at its last good version and the pass continues
#[tokio::test]
async fn test_run_stalled_instance_does_not_block_others() {
    let store = MockJaegerStore::new(vec![
        jaeger("stuck", "1.14.0", None),
        jaeger("done", "1.17.0", None),
    ]);

    let summary = Upgrader::new(failing_registry(), OPERATOR)
        .run(&store)
        .await
        .unwrap();

    assert_eq!(summary.stalled, 1);
    assert_eq!(summary.unchanged, 1);
    assert_eq!(store.stored("stuck").unwrap().recorded_version(), "1.15.0");
    assert_eq!(store.stored("done").unwrap().recorded_version(), "1.17.0");
}

/// Test: the next pass resumes from the last good version
#[tokio::test]
async fn test_run_retries_stalled_instance_from_last_good_version() {
    let store = MockJaegerStore::new(vec![jaeger("stuck", "1.14.0", None)]);
    let upgrader = Upgrader::new(failing_registry(), OPERATOR);

    upgrader.run(&store).await.unwrap();
    let second = upgrader.run(&store).await.unwrap();

    // Nothing new could be applied, so nothing is written the second time
    assert_eq!(second.stalled, 1);
    assert_eq!(store.updates().len(), 1);
    assert_eq!(store.stored("stuck").unwrap().recorded_version(), "1.15.0");
}

/// Test: a write conflict is swallowed and the pass carries on
#[tokio::test]
async fn test_run_swallows_conflicts() {
    let store = MockJaegerStore::new(vec![
        jaeger("contended", "1.14.0", None),
        jaeger("deleted", "1.14.0", None),
        jaeger("fine", "1.14.0", None),
    ]);
    store.fail_update("contended", MockFailure::Conflict);
    store.fail_update("deleted", MockFailure::NotFound);

    let summary = Upgrader::new(test_registry(), OPERATOR)
        .run(&store)
        .await
        .unwrap();

    assert_eq!(summary.persist_failed, 2);
    assert_eq!(summary.upgraded, 1);
    assert_eq!(store.stored("contended").unwrap().recorded_version(), "1.14.0");
    assert_eq!(store.stored("fine").unwrap().recorded_version(), "1.16.0");
}

#[tokio::test]
async fn test_run_fails_when_listing_fails() {
    let store = MockJaegerStore::unavailable();

    let result = Upgrader::new(test_registry(), OPERATOR).run(&store).await;

    assert!(matches!(result, Err(UpgradeError::List(_))));
}

/// Test: concurrent passes reach the same end state as sequential ones
#[tokio::test]
async fn test_run_with_concurrency_matches_sequential() {
    let instances: Vec<Jaeger> = (0..8)
        .map(|i| jaeger(&format!("tracing-{}", i), "1.14.0", None))
        .collect();
    let sequential = MockJaegerStore::new(instances.clone());
    let concurrent = MockJaegerStore::new(instances);

    let first = Upgrader::new(test_registry(), OPERATOR)
        .run(&sequential)
        .await
        .unwrap();
    let second = Upgrader::new(test_registry(), OPERATOR)
        .with_concurrency(4)
        .run(&concurrent)
        .await
        .unwrap();

    assert_eq!(first, second);
    for i in 0..8 {
        let name = format!("tracing-{}", i);
        assert_eq!(sequential.stored(&name), concurrent.stored(&name));
    }
}

#[tokio::test]
async fn test_run_until_shutdown_single_pass() {
    let store = MockJaegerStore::new(vec![jaeger("old", "1.14.0", None)]);
    let (_controller, signal) = shutdown_channel();

    Upgrader::new(test_registry(), OPERATOR)
        .run_until_shutdown(&store, None, signal)
        .await;

    assert_eq!(store.updates().len(), 1);
}

/// Test: an operator told to stop before the first pass writes nothing
#[tokio::test]
async fn test_run_until_shutdown_skips_pass_after_signal() {
    let store = MockJaegerStore::new(vec![jaeger("old", "1.14.0", None)]);
    let (controller, signal) = shutdown_channel();
    controller.shutdown();

    tokio::time::timeout(
        Duration::from_secs(5),
        Upgrader::new(test_registry(), OPERATOR).run_until_shutdown(
            &store,
            Some(Duration::from_secs(3600)),
            signal,
        ),
    )
    .await
    .expect("loop should stop once shutdown is signaled");

    assert!(store.updates().is_empty());
}

/// Test: shutdown during a write lets the pass finish, then ends the loop
#[tokio::test]
async fn test_run_until_shutdown_finishes_pass_in_flight() {
    let store = MockJaegerStore::new(vec![
        jaeger("first", "1.14.0", None),
        jaeger("second", "1.14.0", None),
    ])
    .with_update_delay(Duration::from_millis(100));
    let (controller, signal) = shutdown_channel();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        controller.shutdown();
    });

    tokio::time::timeout(
        Duration::from_secs(5),
        Upgrader::new(test_registry(), OPERATOR).run_until_shutdown(
            &store,
            Some(Duration::from_secs(3600)),
            signal,
        ),
    )
    .await
    .expect("loop should stop after the pass in flight");

    assert_eq!(store.updates().len(), 2);
    assert_eq!(store.stored("first").unwrap().recorded_version(), "1.16.0");
    assert_eq!(store.stored("second").unwrap().recorded_version(), "1.16.0");
}
