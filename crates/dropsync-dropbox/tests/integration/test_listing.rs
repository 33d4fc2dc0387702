//! Integration tests for recursive folder listing
//!
//! Verifies end-to-end behavior of the listing module against a
//! wiremock-based Dropbox API mock server:
//! - Single page with mixed entry types
//! - Cursor pagination across pages
//! - Request body and team headers
//! - Error mapping and 429 retry

use dropsync_core::domain::SourceRoot;
use dropsync_core::ports::ISourceLister;
use dropsync_dropbox::client::{
    path_root_header, DropboxClient, PATH_ROOT_HEADER, SELECT_USER_HEADER,
};
use dropsync_dropbox::listing;
use dropsync_dropbox::provider::DropboxSourceLister;
use dropsync_dropbox::DropboxError;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{self, file_entry, folder_entry, raw_header, LIST_FOLDER, LIST_FOLDER_CONTINUE};

const MODIFIED: &str = "2026-01-15T10:00:00Z";

fn data_root() -> SourceRoot {
    SourceRoot::new("/Apps/data").unwrap()
}

const NOT_FOUND_BODY: &str =
    r#"{"error_summary": "path/not_found/..", "error": {".tag": "path"}}"#;

#[tokio::test]
async fn test_single_page_returns_only_files() {
    let (server, client) = common::setup_dropbox_mock().await;

    let entries = serde_json::json!([
        folder_entry("/Apps/data/a"),
        file_entry("/Apps/data/a/b.txt", "2026-01-15T10:00:00Z", 1024),
        file_entry("/Apps/data/top.csv", "2026-01-16T08:00:00Z", 12),
        { ".tag": "deleted", "name": "old.txt", "path_display": "/Apps/data/old.txt" }
    ]);
    common::mount_list_single_page(&server, entries).await;

    let items = listing::list_all(&client, &data_root())
        .await
        .expect("listing failed");

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].relative_path, "a/b.txt");
    assert_eq!(items[0].absolute_path, "/Apps/data/a/b.txt");
    assert_eq!(items[0].size_bytes, 1024);
    assert_eq!(items[1].relative_path, "top.csv");
}

#[tokio::test]
async fn test_pagination_follows_cursor() {
    let (server, client) = common::setup_dropbox_mock().await;

    common::mount_list_paginated(
        &server,
        serde_json::json!([file_entry("/Apps/data/one.txt", MODIFIED, 1)]),
        serde_json::json!([
            file_entry("/Apps/data/two.txt", "2026-01-15T10:00:00Z", 2),
            file_entry("/Apps/data/x/three.txt", "2026-01-15T10:00:00Z", 3)
        ]),
    )
    .await;

    let items = listing::list_all(&client, &data_root())
        .await
        .expect("paginated listing failed");

    let paths: Vec<_> = items.iter().map(|i| i.relative_path.as_str()).collect();
    assert_eq!(paths, vec!["one.txt", "two.txt", "x/three.txt"]);
}

#[tokio::test]
async fn test_request_is_recursive_and_root_is_empty_string() {
    let (server, client) = common::setup_dropbox_mock().await;

    Mock::given(method("POST"))
        .and(path(LIST_FOLDER))
        .and(header("authorization", "Bearer test-access-token"))
        .and(body_partial_json(
            serde_json::json!({ "path": "", "recursive": true }),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "entries": [file_entry("/root.txt", "2026-01-15T10:00:00Z", 5)],
            "cursor": "c",
            "has_more": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    let items = listing::list_all(&client, &SourceRoot::root())
        .await
        .expect("root listing failed");
    assert_eq!(items[0].relative_path, "root.txt");
}

#[tokio::test]
async fn test_team_headers_are_sent() {
    let server = MockServer::start().await;
    let client = DropboxClient::with_base_urls("t", server.uri(), server.uri())
        .with_root_namespace("3235641")
        .with_member_id("dbmid:member");

    Mock::given(method("POST"))
        .and(path(LIST_FOLDER))
        .and(raw_header(PATH_ROOT_HEADER, path_root_header("3235641")))
        .and(header(SELECT_USER_HEADER, "dbmid:member"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "entries": [],
            "cursor": "c",
            "has_more": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    let items = listing::list_all(&client, &data_root())
        .await
        .expect("team listing failed");
    assert!(items.is_empty());
}

#[tokio::test]
async fn test_failure_on_continue_page_fails_whole_listing() {
    let (server, client) = common::setup_dropbox_mock().await;

    Mock::given(method("POST"))
        .and(path(LIST_FOLDER))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "entries": [file_entry("/Apps/data/one.txt", "2026-01-15T10:00:00Z", 1)],
            "cursor": "cursor-1",
            "has_more": true
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(LIST_FOLDER_CONTINUE))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .mount(&server)
        .await;

    let err = listing::list_all(&client, &data_root())
        .await
        .expect_err("listing should fail");
    assert!(matches!(err, DropboxError::ServerError(_)), "got {err:?}");
}

#[tokio::test]
async fn test_unauthorized_is_mapped() {
    let (server, client) = common::setup_dropbox_mock().await;

    Mock::given(method("POST"))
        .and(path(LIST_FOLDER))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_string(r#"{"error_summary": "expired_access_token/"}"#),
        )
        .mount(&server)
        .await;

    let err = listing::list_all(&client, &data_root()).await.unwrap_err();
    assert!(matches!(err, DropboxError::Unauthorized(_)), "got {err:?}");
}

#[tokio::test]
async fn test_missing_root_is_not_found() {
    let (server, client) = common::setup_dropbox_mock().await;

    Mock::given(method("POST"))
        .and(path(LIST_FOLDER))
        .respond_with(ResponseTemplate::new(409).set_body_string(NOT_FOUND_BODY))
        .mount(&server)
        .await;

    let err = listing::list_all(&client, &data_root()).await.unwrap_err();
    assert!(matches!(err, DropboxError::NotFound(_)), "got {err:?}");
}

#[tokio::test]
async fn test_rate_limited_request_is_retried() {
    let (server, client) = common::setup_dropbox_mock().await;

    Mock::given(method("POST"))
        .and(path(LIST_FOLDER))
        .respond_with(ResponseTemplate::new(429).append_header("Retry-After", "0"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;

    common::mount_list_single_page(
        &server,
        serde_json::json!([file_entry("/Apps/data/a.txt", "2026-01-15T10:00:00Z", 1)]),
    )
    .await;

    let items = listing::list_all(&client, &data_root())
        .await
        .expect("listing should succeed after retries");
    assert_eq!(items.len(), 1);
}

#[tokio::test]
async fn test_rate_limit_gives_up_after_max_attempts() {
    let server = MockServer::start().await;
    let client =
        DropboxClient::with_base_urls("t", server.uri(), server.uri()).with_max_attempts(3);

    Mock::given(method("POST"))
        .and(path(LIST_FOLDER))
        .respond_with(ResponseTemplate::new(429).append_header("Retry-After", "0"))
        .expect(3)
        .mount(&server)
        .await;

    let err = listing::list_all(&client, &data_root()).await.unwrap_err();
    assert!(
        matches!(err, DropboxError::TooManyRequests { .. }),
        "got {err:?}"
    );
}

#[tokio::test]
async fn test_source_lister_port() {
    let (server, client) = common::setup_dropbox_mock().await;
    common::mount_list_single_page(
        &server,
        serde_json::json!([file_entry("/Apps/Data/Q1/report.pdf", MODIFIED, 7)]),
    )
    .await;

    let lister = DropboxSourceLister::new(client);
    let items = lister.list_all(&data_root()).await.expect("port listing failed");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].relative_path, "Q1/report.pdf");
}
