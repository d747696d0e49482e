//! Azure DevOps client against a loopback HTTP server
//!
//! Checks the wire shape of every call the mirror makes: URLs, query,
//! authentication, request bodies, and how statuses map to errors.

use mirror_review::{AzureDevOpsClient, AzureDevOpsConfig, Error, PullRequestRequest, ReviewPlatform};
use mirror_test_utils::http::FakeHttpServer;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

fn client_for(server: &FakeHttpServer) -> AzureDevOpsClient {
    AzureDevOpsClient::new(AzureDevOpsConfig::new(server.url(), "proj", "secret-pat")).unwrap()
}

fn request(clean: bool) -> PullRequestRequest {
    PullRequestRequest {
        merge_was_clean: clean,
        upstream_commit: "1111bbbb".into(),
        base_commit: "0000aaaa".into(),
        source_ref: "refs/heads/pr_base_0000aaaa_upstream_1111bbbb".into(),
        target_ref: "refs/heads/master".into(),
        repository_id: "repo-guid".into(),
    }
}

fn created(id: u64) -> (u16, String) {
    (
        201,
        json!({
            "pullRequestId": id,
            "url": format!("https://dev.azure.com/contoso/_apis/git/pullRequests/{id}"),
            "status": "active"
        })
        .to_string(),
    )
}

// ============================================================================
// Repository lookup
// ============================================================================

#[test]
fn test_resolve_repository_id() {
    let server = FakeHttpServer::start(vec![(
        200,
        json!({"id": "repo-guid", "name": "mirror"}).to_string(),
    )]);

    let id = client_for(&server).resolve_repository_id("mirror").unwrap();

    assert_eq!(id, "repo-guid");
    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "GET");
    assert_eq!(requests[0].path(), "/proj/_apis/git/repositories/mirror");
    assert!(requests[0].target.contains("api-version=7.1"));
    let auth = requests[0].header("authorization").unwrap();
    assert!(auth.starts_with("Basic "), "got {auth}");
}

#[test]
fn test_unknown_repository_is_not_found() {
    let server = FakeHttpServer::start(vec![(
        404,
        json!({"message": "TF401019: The Git repository with name or identifier nope does not exist."})
            .to_string(),
    )]);

    let err = client_for(&server).resolve_repository_id("nope").unwrap_err();

    assert!(matches!(err, Error::RepositoryNotFound { ref name } if name == "nope"), "got {err:?}");
}

#[test]
fn test_unauthorized_lookup_is_api_error() {
    let server = FakeHttpServer::start(vec![(401, "Access denied".to_string())]);

    let err = client_for(&server).resolve_repository_id("mirror").unwrap_err();

    match err {
        Error::Api { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "Access denied");
        }
        other => panic!("expected an API error, got {other:?}"),
    }
}

#[test]
fn test_malformed_lookup_response_is_decode_error() {
    let server = FakeHttpServer::start(vec![(200, json!({"name": "mirror"}).to_string())]);

    let err = client_for(&server).resolve_repository_id("mirror").unwrap_err();

    assert!(matches!(err, Error::Decode(_)), "got {err:?}");
}

// ============================================================================
// Pull request creation
// ============================================================================

#[test]
fn test_clean_merge_creates_ready_pull_request() {
    let server = FakeHttpServer::start(vec![created(17)]);

    let pr = client_for(&server).create_pull_request(&request(true)).unwrap();

    assert_eq!(pr.id, 17);
    assert!(pr.created);
    assert_eq!(
        pr.url.as_deref(),
        Some("https://dev.azure.com/contoso/_apis/git/pullRequests/17")
    );

    let requests = server.requests();
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].path(), "/proj/_apis/git/repositories/repo-guid/pullrequests");
    let body: Value = serde_json::from_str(&requests[0].body).unwrap();
    assert_eq!(body["sourceRefName"], "refs/heads/pr_base_0000aaaa_upstream_1111bbbb");
    assert_eq!(body["targetRefName"], "refs/heads/master");
    assert_eq!(body["isDraft"], false);
    assert_eq!(body["title"], "Mirror upstream 1111bbbb into master (base 0000aaaa)");
}

#[test]
fn test_forced_merge_creates_draft_pull_request() {
    let server = FakeHttpServer::start(vec![created(18)]);

    client_for(&server).create_pull_request(&request(false)).unwrap();

    let body: Value = serde_json::from_str(&server.requests()[0].body).unwrap();
    assert_eq!(body["isDraft"], true);
    assert!(body["title"].as_str().unwrap().starts_with("[conflicts] "));
    assert!(body["description"].as_str().unwrap().contains("conflict markers"));
}

#[test]
fn test_existing_pull_request_is_reused() {
    let server = FakeHttpServer::start(vec![
        (
            409,
            json!({"message": "TF401179: An active pull request for the source and target branch already exists."})
                .to_string(),
        ),
        (
            200,
            json!({"value": [{"pullRequestId": 5, "url": "https://example.invalid/pr/5"}], "count": 1})
                .to_string(),
        ),
    ]);

    let pr = client_for(&server).create_pull_request(&request(true)).unwrap();

    assert_eq!(pr.id, 5);
    assert!(!pr.created);

    let requests = server.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].method, "GET");
    assert_eq!(requests[1].path(), "/proj/_apis/git/repositories/repo-guid/pullrequests");
    assert!(requests[1].target.contains("searchCriteria.status=active"));
    assert!(requests[1].target.contains("searchCriteria.sourceRefName="));
}

#[test]
fn test_conflict_without_active_pull_request_is_reported() {
    let server = FakeHttpServer::start(vec![
        (409, json!({"message": "TF401179: exists"}).to_string()),
        (200, json!({"value": [], "count": 0}).to_string()),
    ]);

    let err = client_for(&server).create_pull_request(&request(true)).unwrap_err();

    assert!(matches!(err, Error::Api { status: 409, .. }), "got {err:?}");
}

#[test]
fn test_server_error_carries_message() {
    let server = FakeHttpServer::start(vec![(
        500,
        json!({"$id": "1", "message": "Internal failure"}).to_string(),
    )]);

    let err = client_for(&server).create_pull_request(&request(true)).unwrap_err();

    match err {
        Error::Api { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "Internal failure");
        }
        other => panic!("expected an API error, got {other:?}"),
    }
}

#[test]
fn test_unreachable_platform_is_transport_error() {
    // Bind then drop so the port is very likely closed.
    let port = std::net::TcpListener::bind(("127.0.0.1", 0))
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let client = AzureDevOpsClient::new(AzureDevOpsConfig::new(
        format!("http://127.0.0.1:{port}"),
        "proj",
        "pat",
    ))
    .unwrap();

    let err = client.resolve_repository_id("mirror").unwrap_err();

    assert!(matches!(err, Error::Transport(_)), "got {err:?}");
}
