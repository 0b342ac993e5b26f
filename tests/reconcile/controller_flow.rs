use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};
use wiremock::MockServer;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use approval_reconciler::ReconcileOutcome;
use approval_reconciler::client::ApprovalStatus;
use approval_reconciler::error::ReconcileError;
use approval_reconciler::resource::{ApprovalRequestSpec, Lifecycle, SyncReason};
use approval_reconciler::store::{MemoryStore, StateStore};

use crate::support::{controller, mount_archive, mount_create, mount_fetch, record};

#[tokio::test]
async fn full_lifecycle_against_http_service() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(MemoryStore::new());
    let (controller, _shutdown) = controller(store.clone(), &server, &tmp);
    store
        .apply_desired("deploy", ApprovalRequestSpec::new("alice", "deploy-prod"))
        .await
        .unwrap();

    // Create
    mount_create(&server, 42).await;
    let outcome = assert_ok!(controller.reconcile("deploy").await);
    assert_eq!(outcome, ReconcileOutcome::Created);
    let observed = store.get("deploy").await.unwrap().unwrap().status.at_provider;
    assert_eq!(observed.external_id, Some(42));
    assert_eq!(
        observed.url,
        Some(format!("{}/approval_requests/42", server.uri()))
    );

    // Approve
    server.reset().await;
    mount_fetch(&server, record(42, "Approved", false)).await;
    assert_eq!(
        controller.reconcile("deploy").await.unwrap(),
        ReconcileOutcome::Observed
    );
    let observed = store.get("deploy").await.unwrap().unwrap().status.at_provider;
    assert_eq!(observed.status, Some(ApprovalStatus::Approved));
    assert!(observed.has_condition(Lifecycle::Available));
    assert!(observed.signoff_note.is_some());

    // Delete
    store.request_deletion("deploy").await.unwrap();
    mount_archive(&server, 42).await;
    assert_eq!(
        controller.reconcile("deploy").await.unwrap(),
        ReconcileOutcome::Deleting
    );

    server.reset().await;
    mount_fetch(&server, record(42, "Approved", true)).await;
    assert_eq!(
        controller.reconcile("deploy").await.unwrap(),
        ReconcileOutcome::Finalized
    );
    assert!(store.get("deploy").await.unwrap().is_none());
}

#[tokio::test]
async fn service_outage_is_recorded_and_retried() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(MemoryStore::new());
    let (controller, _shutdown) = controller(store.clone(), &server, &tmp);
    store
        .apply_desired("deploy", ApprovalRequestSpec::new("alice", "deploy-prod"))
        .await
        .unwrap();
    mount_create(&server, 42).await;
    controller.reconcile("deploy").await.unwrap();

    server.reset().await;
    Mock::given(method("GET"))
        .and(path("/approval_requests/42"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database down"))
        .mount(&server)
        .await;
    let before = store.get("deploy").await.unwrap().unwrap().status.at_provider;

    let err = assert_err!(controller.reconcile("deploy").await);

    assert!(matches!(err, ReconcileError::Observe { id: 42, .. }));
    let after = store.get("deploy").await.unwrap().unwrap();
    assert_eq!(after.status.at_provider, before);
    let synced = after.status.synced.unwrap();
    assert_eq!(synced.reason, SyncReason::ReconcileError);
    assert!(synced.message.unwrap().contains("database down"));
}

#[tokio::test]
async fn running_controller_converges_without_manual_attempts() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(MemoryStore::new());
    let (controller, shutdown) = controller(store.clone(), &server, &tmp);
    mount_create(&server, 42).await;
    mount_fetch(&server, record(42, "Pending", false)).await;

    let run = tokio::spawn(Arc::clone(&controller).run());
    store
        .apply_desired("deploy", ApprovalRequestSpec::new("alice", "deploy-prod"))
        .await
        .unwrap();
    controller.handle().notify("deploy");

    let converged = tokio::time::timeout(Duration::from_secs(3), async {
        loop {
            let record = store.get("deploy").await.unwrap().unwrap();
            if record
                .status
                .synced
                .as_ref()
                .is_some_and(|c| c.is_success())
                && record.status.at_provider.external_id == Some(42)
            {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(converged.is_ok(), "controller did not create the request");

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(2), run)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    let creates = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.method.as_str() == "POST" && r.url.path() == "/approval_requests")
        .count();
    assert_eq!(creates, 1);
}
