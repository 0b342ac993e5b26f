use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::MockServer;

use approval_reconciler::config::Config;
use approval_reconciler::resource::{ApprovalRequestSpec, DeletionPolicy};
use approval_reconciler::store::{FileStore, StateStore};
use approval_reconciler::{Controller, ReconcileOutcome};

use crate::support::{mount_create, mount_fetch, record};

fn write_config(dir: &TempDir, server: &MockServer) -> Config {
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        format!(
            r#"
[controller]
workers = 1
poll_interval_secs = 1
reconcile_timeout_secs = 5

[providers.default]
endpoint = "{}"
"#,
            server.uri()
        ),
    )
    .unwrap();
    Config::load_from(&path).unwrap()
}

#[tokio::test]
async fn configured_controller_persists_status_to_disk() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();
    let config = write_config(&tmp, &server);
    mount_create(&server, 42).await;

    FileStore::new(config.store_path())
        .apply_desired("deploy", ApprovalRequestSpec::new("alice", "deploy-prod"))
        .await
        .unwrap();

    let controller = Controller::from_config(&config, CancellationToken::new());
    assert_eq!(
        controller.reconcile("deploy").await.unwrap(),
        ReconcileOutcome::Created
    );

    let reopened = FileStore::new(tmp.path().join("resources.json"));
    let record = reopened.get("deploy").await.unwrap().unwrap();
    assert_eq!(record.status.at_provider.external_id, Some(42));
    assert!(record.status.synced.unwrap().is_success());
}

#[tokio::test]
async fn orphaned_resource_is_removed_from_disk_only() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();
    let config = write_config(&tmp, &server);
    mount_create(&server, 42).await;
    mount_fetch(&server, record(42, "Pending", false)).await;

    let store = FileStore::new(config.store_path());
    let mut spec = ApprovalRequestSpec::new("alice", "deploy-prod");
    spec.deletion_policy = DeletionPolicy::Orphan;
    store.apply_desired("deploy", spec).await.unwrap();

    let controller = Controller::from_config(&config, CancellationToken::new());
    controller.reconcile("deploy").await.unwrap();
    store.request_deletion("deploy").await.unwrap();

    assert_eq!(
        controller.reconcile("deploy").await.unwrap(),
        ReconcileOutcome::Finalized
    );
    assert!(store.list().await.unwrap().is_empty());

    let archives = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path().ends_with("/archive"))
        .count();
    assert_eq!(archives, 0);
}
