#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use approval_reconciler::config::{CredentialsSource, ProviderConfig};
use approval_reconciler::connector::ProviderConnector;
use approval_reconciler::observability::NoopObserver;
use approval_reconciler::store::StateStore;
use approval_reconciler::{Controller, ControllerSettings};

pub const TOKEN: &str = "s3cret";

pub fn record(id: u64, status: &str, archived: bool) -> Value {
    json!({
        "id": id,
        "requester": "alice",
        "subject": "deploy-prod",
        "status": status,
        "decisions": [],
        "archived": archived,
    })
}

pub async fn mount_create(server: &MockServer, id: u64) {
    Mock::given(method("POST"))
        .and(path("/approval_requests"))
        .respond_with(ResponseTemplate::new(201).set_body_json(record(id, "Pending", false)))
        .mount(server)
        .await;
}

pub async fn mount_fetch(server: &MockServer, body: Value) {
    let id = body["id"].as_u64().unwrap_or_default();
    Mock::given(method("GET"))
        .and(path(format!("/approval_requests/{id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

pub async fn mount_archive(server: &MockServer, id: u64) {
    Mock::given(method("POST"))
        .and(path(format!("/approval_requests/{id}/archive")))
        .respond_with(ResponseTemplate::new(204))
        .mount(server)
        .await;
}

/// Provider config pointing at `server`, authenticated with a token file in `dir`.
pub fn providers(server: &MockServer, dir: &TempDir) -> BTreeMap<String, ProviderConfig> {
    let token_path = dir.path().join("token");
    std::fs::write(&token_path, TOKEN).unwrap();

    BTreeMap::from([(
        "default".to_string(),
        ProviderConfig {
            endpoint: server.uri(),
            request_timeout_secs: 5,
            credentials: CredentialsSource::File {
                path: token_path.display().to_string(),
            },
        },
    )])
}

pub fn settings() -> ControllerSettings {
    ControllerSettings {
        workers: 2,
        poll_interval: Duration::from_millis(50),
        reconcile_timeout: Duration::from_secs(5),
        resync_interval: Duration::from_millis(20),
        initial_backoff: Duration::from_millis(10),
        max_backoff: Duration::from_millis(100),
    }
}

pub fn controller(
    store: Arc<dyn StateStore>,
    server: &MockServer,
    dir: &TempDir,
) -> (Arc<Controller>, CancellationToken) {
    let shutdown = CancellationToken::new();
    let controller = Controller::new(
        store,
        Arc::new(ProviderConnector::new(providers(server, dir))),
        Arc::new(NoopObserver),
        settings(),
        shutdown.clone(),
    );
    (Arc::new(controller), shutdown)
}
