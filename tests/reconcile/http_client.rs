use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use approval_reconciler::client::{
    ApprovalClient, ApprovalDecision, ApprovalStatus, HttpApprovalClient,
};
use approval_reconciler::error::ClientError;

use crate::support::{TOKEN, record};

fn client(server: &MockServer) -> HttpApprovalClient {
    HttpApprovalClient::new(&server.uri(), Some(TOKEN)).unwrap()
}

#[tokio::test]
async fn fetch_sends_bearer_token_and_decodes_record() {
    let server = MockServer::start().await;
    let mut body = record(7, "Approved", false);
    body["decisions"] = json!([{"approver": "bob", "decision": "approve"}]);

    Mock::given(method("GET"))
        .and(path("/approval_requests/7"))
        .and(header("authorization", "Bearer s3cret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(&server)
        .await;

    let fetched = client(&server).fetch(7).await.unwrap();

    assert_eq!(fetched.id, 7);
    assert_eq!(fetched.status, ApprovalStatus::Approved);
    assert_eq!(fetched.decisions.len(), 1);
    assert_eq!(fetched.decisions[0].decision, ApprovalDecision::Approve);
    assert!(!fetched.archived);
    server.verify().await;
}

#[tokio::test]
async fn fetch_maps_missing_and_gone_to_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/approval_requests/7"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/approval_requests/8"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&server)
        .await;

    let client = client(&server);

    assert!(matches!(
        client.fetch(7).await,
        Err(ClientError::NotFound { id: 7 })
    ));
    assert!(client.fetch(8).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn fetch_server_error_keeps_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/approval_requests/7"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let err = client(&server).fetch(7).await.unwrap_err();

    match err {
        ClientError::Status {
            operation,
            status,
            body,
        } => {
            assert_eq!(operation, "fetch");
            assert_eq!(status, 503);
            assert_eq!(body, "maintenance");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn fetch_garbage_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/approval_requests/7"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = client(&server).fetch(7).await.unwrap_err();

    assert!(matches!(err, ClientError::Decode { operation: "fetch", .. }));
}

#[tokio::test]
async fn create_posts_requester_and_subject() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/approval_requests"))
        .and(header("authorization", "Bearer s3cret"))
        .and(body_json(json!({"requester": "alice", "subject": "deploy-prod"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(record(42, "Pending", false)))
        .expect(1)
        .mount(&server)
        .await;

    let created = client(&server).create("alice", "deploy-prod").await.unwrap();

    assert_eq!(created.id, 42);
    assert_eq!(created.status, ApprovalStatus::Pending);
    server.verify().await;
}

#[tokio::test]
async fn create_rejection_is_a_status_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/approval_requests"))
        .respond_with(ResponseTemplate::new(422).set_body_string("subject required"))
        .mount(&server)
        .await;

    let err = client(&server).create("alice", "").await.unwrap_err();

    assert!(matches!(
        err,
        ClientError::Status {
            operation: "create",
            status: 422,
            ..
        }
    ));
}

#[tokio::test]
async fn archive_posts_to_the_record() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/approval_requests/7/archive"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/approval_requests/8/archive"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = client(&server);

    client.archive(7).await.unwrap();
    assert!(client.archive(8).await.unwrap_err().is_not_found());
    server.verify().await;
}

#[tokio::test]
async fn unreachable_service_is_a_transport_error() {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let client = HttpApprovalClient::with_timeout(&uri, None, 2).unwrap();
    let err = client.fetch(1).await.unwrap_err();

    assert!(matches!(err, ClientError::Transport { operation: "fetch", .. }));
}

#[test]
fn locator_points_at_the_record() {
    let client = HttpApprovalClient::new("https://approvals.example.com/", None).unwrap();

    assert_eq!(
        client.locator(9),
        "https://approvals.example.com/approval_requests/9"
    );
}
