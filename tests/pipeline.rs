mod common;

use common::{FakeRegistry, RecordingEngine};
use registry_sync::cli::Runner;
use registry_sync::config::SyncConfig;
use registry_sync::diff::diff;
use registry_sync::error::RegistryError;
use registry_sync::inventory::{FetchPolicy, InventoryBuilder, build_pair};
use registry_sync::logging::Logger;
use registry_sync::registry::RegistryClient;
use registry_sync::sync::{SyncAction, SyncExecutor, TagStatus, plan};
use std::sync::Arc;
use std::time::Duration;

fn config(dry_run: bool) -> SyncConfig {
    SyncConfig {
        local: Some("local:5000".to_string()),
        remote: Some("remote:5000".to_string()),
        dry_run,
        quiet: true,
        ..SyncConfig::default()
    }
}

/// local: web:v1 older, web:v2 only here, api:1 tied, db:9 only here
/// remote: web:v1 newer, api:1 tied, cache:3 only there
fn registries() -> (RegistryClient, RegistryClient) {
    let (_, local) = FakeRegistry::new("local:5000")
        .image("web", "v1", "l-web-1", "2016-01-18T10:00:00Z")
        .image("web", "v2", "l-web-2", "2016-01-20T10:00:00Z")
        .image("api", "1", "l-api-1", "2016-01-18T10:00:00Z")
        .image("db", "9", "l-db-9", "2016-01-18T10:00:00Z")
        .into_client();
    let (_, remote) = FakeRegistry::new("remote:5000")
        .image("web", "v1", "r-web-1", "2016-01-19T10:00:00Z")
        .image("api", "1", "r-api-1", "2016-01-18T10:00:00Z")
        .image("cache", "3", "r-cache-3", "2016-01-18T10:00:00Z")
        .into_client();
    (local, remote)
}

fn runner(dry_run: bool, engine: Arc<RecordingEngine>) -> Runner {
    let (local, remote) = registries();
    Runner::new(config(dry_run))
        .unwrap()
        .with_clients(local, remote)
        .with_engine(engine)
        .with_logger(Logger::new_quiet())
}

#[tokio::test]
async fn test_inventory_diff_plan_execute() {
    let (local, remote) = registries();
    let (local, remote) = build_pair(&InventoryBuilder::new(local), &InventoryBuilder::new(remote))
        .await
        .unwrap();

    let result = diff(&local, &remote);
    assert!(result.is_win("web", "v2"));
    assert!(result.is_win("api", "1"));
    assert!(result.is_win("db", "9"));
    assert!(result.is_loss("web", "v1"));
    assert!(result.is_loss("cache", "3"));
    assert_eq!(result.unresolved_count(), 0);

    let sync_plan = plan(&result.wins, local.registry(), remote.registry());
    assert_eq!(sync_plan.tags.len(), 3);

    let engine = Arc::new(RecordingEngine::default());
    let report = SyncExecutor::new(engine.clone()).execute(&sync_plan).await;

    assert!(report.is_success());
    assert_eq!(report.synced_count(), 3);
    assert_eq!(
        engine.calls()[..4],
        [
            vec!["pull", "local:5000/api:1"],
            vec!["tag", "local:5000/api:1", "remote:5000/api:1"],
            vec!["push", "remote:5000/api:1"],
            vec!["rmi", "local:5000/api:1", "remote:5000/api:1"],
        ]
        .map(|args| args.into_iter().map(String::from).collect::<Vec<_>>())
    );
}

#[tokio::test]
async fn test_dry_run_never_invokes_the_engine() {
    let engine = Arc::new(RecordingEngine::default());
    let report = runner(true, engine.clone()).run().await.unwrap();

    assert!(engine.calls().is_empty());
    assert!(report.sync.is_none());
    assert_eq!(report.exit_code(), 0);

    let planned = report.planned.unwrap();
    assert_eq!(planned.len(), 12);
    assert_eq!(planned[0], "docker pull local:5000/api:1");
    assert_eq!(planned[3], "docker rmi local:5000/api:1 remote:5000/api:1");
    assert!(planned.iter().all(|line| !line.contains("cache")));
}

#[tokio::test]
async fn test_run_syncs_wins_and_skips_losses() {
    let engine = Arc::new(RecordingEngine::default());
    let report = runner(false, engine.clone()).run().await.unwrap();

    let sync = report.sync.as_ref().unwrap();
    assert_eq!(sync.synced_count(), 3);
    assert_eq!(report.diff.lose_count(), 2);
    assert_eq!(report.exit_code(), 0);

    let pushed: Vec<String> = engine
        .calls()
        .into_iter()
        .filter(|args| args[0] == "push")
        .map(|args| args[1].clone())
        .collect();
    assert_eq!(
        pushed,
        vec![
            "remote:5000/api:1",
            "remote:5000/db:9",
            "remote:5000/web:v2"
        ]
    );
}

#[tokio::test]
async fn test_failed_push_sets_exit_code_and_spares_other_tags() {
    let engine = Arc::new(RecordingEngine::default().failing("9", SyncAction::Push));
    let report = runner(false, engine).run().await.unwrap();

    let sync = report.sync.as_ref().unwrap();
    assert_eq!(sync.synced_count(), 2);
    assert_eq!(sync.failed_count(), 1);

    let failed = sync.outcomes.iter().find(|o| o.repo == "db").unwrap();
    assert_eq!(
        failed.status,
        TagStatus::SyncFailed {
            action: SyncAction::Push,
            reason: "push denied".to_string()
        }
    );
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn test_fail_soft_run_leaves_broken_tags_unresolved() {
    let (_, local) = FakeRegistry::new("local:5000")
        .image("web", "v1", "l-web-1", "2016-01-20T10:00:00Z")
        .broken_manifest("web", "v2")
        .into_client();
    let (_, remote) = FakeRegistry::new("remote:5000")
        .image("web", "v2", "r-web-2", "2016-01-18T10:00:00Z")
        .into_client();

    let config = SyncConfig {
        fetch_policy: FetchPolicy::FailSoft,
        ..config(false)
    };
    let engine = Arc::new(RecordingEngine::default());
    let report = Runner::new(config)
        .unwrap()
        .with_clients(local, remote)
        .with_engine(engine.clone())
        .with_logger(Logger::new_quiet())
        .run()
        .await
        .unwrap();

    assert_eq!(report.local_failures.len(), 1);
    assert_eq!(report.diff.unresolved_count(), 1);
    assert!(report.diff.is_win("web", "v1"));
    assert!(!report.diff.is_loss("web", "v2"));
    assert_eq!(report.sync.unwrap().synced_count(), 1);
}

#[tokio::test]
async fn test_fail_soft_run_never_pushes_into_an_unlisted_remote_repo() {
    let (_, local) = FakeRegistry::new("local:5000")
        .image("web", "v1", "l-web-1", "2015-03-01T10:00:00Z")
        .image("db", "9", "l-db-9", "2016-01-18T10:00:00Z")
        .into_client();
    let (_, remote) = FakeRegistry::new("remote:5000")
        .broken_tag_list("web")
        .into_client();

    let config = SyncConfig {
        fetch_policy: FetchPolicy::FailSoft,
        ..config(false)
    };
    let engine = Arc::new(RecordingEngine::default());
    let report = Runner::new(config)
        .unwrap()
        .with_clients(local, remote)
        .with_engine(engine.clone())
        .with_logger(Logger::new_quiet())
        .run()
        .await
        .unwrap();

    assert_eq!(report.remote_failures.len(), 1);
    assert!(!report.diff.is_win("web", "v1"));
    assert_eq!(report.diff.unresolved_count(), 1);
    assert!(report.diff.is_win("db", "9"));
    assert!(
        engine
            .calls()
            .iter()
            .flatten()
            .all(|arg| !arg.contains("web")),
        "web must not be touched: {:?}",
        engine.calls()
    );
    assert_eq!(report.sync.unwrap().synced_count(), 1);
}

#[tokio::test]
async fn test_fail_fast_run_aborts_before_syncing() {
    let (_, local) = FakeRegistry::new("local:5000")
        .image("web", "v1", "l-web-1", "2016-01-20T10:00:00Z")
        .broken_manifest("web", "v2")
        .into_client();
    let (_, remote) = FakeRegistry::new("remote:5000").into_client();

    let engine = Arc::new(RecordingEngine::default());
    let result = Runner::new(config(false))
        .unwrap()
        .with_clients(local, remote)
        .with_engine(engine.clone())
        .with_logger(Logger::new_quiet())
        .run()
        .await;

    assert!(result.is_err());
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn test_cancellation_interrupts_the_api_check() {
    let (_, local) = FakeRegistry::new("local:5000")
        .delayed(Duration::from_secs(30))
        .into_client();
    let (_, remote) = FakeRegistry::new("remote:5000").into_client();

    let engine = Arc::new(RecordingEngine::default());
    let runner = Runner::new(config(false))
        .unwrap()
        .with_clients(local, remote)
        .with_engine(engine.clone())
        .with_logger(Logger::new_quiet());

    let cancel = runner.cancellation_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    });

    let result = tokio::time::timeout(Duration::from_secs(5), runner.run())
        .await
        .expect("run did not react to cancellation");

    assert!(matches!(result, Err(RegistryError::Cancelled(_))));
    assert!(engine.calls().is_empty());
}
