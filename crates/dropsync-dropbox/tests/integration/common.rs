//! Shared test helpers for Dropbox API integration tests
//!
//! Each helper mounts mock endpoints on a wiremock server. The client
//! returned by [`setup_dropbox_mock`] points both Dropbox hosts at it.

use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

use dropsync_dropbox::client::DropboxClient;

pub const LIST_FOLDER: &str = "/2/files/list_folder";
pub const LIST_FOLDER_CONTINUE: &str = "/2/files/list_folder/continue";
pub const DOWNLOAD: &str = "/2/files/download";

/// Starts a mock server and returns a (MockServer, DropboxClient) tuple.
pub async fn setup_dropbox_mock() -> (MockServer, DropboxClient) {
    let server = MockServer::start().await;
    let client = DropboxClient::with_base_urls("test-access-token", server.uri(), server.uri());
    (server, client)
}

/// Matches a header whose raw value equals `expected`.
///
/// The built-in `header` matcher splits values on commas, which breaks
/// JSON-valued headers.
pub struct RawHeader {
    name: &'static str,
    expected: String,
}

pub fn raw_header(name: &'static str, expected: impl Into<String>) -> RawHeader {
    RawHeader {
        name,
        expected: expected.into(),
    }
}

impl Match for RawHeader {
    fn matches(&self, request: &Request) -> bool {
        request
            .headers
            .get(self.name)
            .and_then(|v| v.to_str().ok())
            .map_or(false, |v| v == self.expected)
    }
}

/// A `.tag = file` listing entry
pub fn file_entry(path_display: &str, server_modified: &str, size: u64) -> serde_json::Value {
    serde_json::json!({
        ".tag": "file",
        "name": path_display.rsplit('/').next().unwrap_or_default(),
        "path_lower": path_display.to_lowercase(),
        "path_display": path_display,
        "id": format!("id:{}", path_display.len()),
        "client_modified": server_modified,
        "server_modified": server_modified,
        "rev": "015f0e3a5c1a2b30000000",
        "size": size,
    })
}

/// A `.tag = folder` listing entry
pub fn folder_entry(path_display: &str) -> serde_json::Value {
    serde_json::json!({
        ".tag": "folder",
        "name": path_display.rsplit('/').next().unwrap_or_default(),
        "path_lower": path_display.to_lowercase(),
        "path_display": path_display,
        "id": "id:folder",
    })
}

fn page(entries: serde_json::Value, cursor: &str, has_more: bool) -> serde_json::Value {
    serde_json::json!({
        "entries": entries,
        "cursor": cursor,
        "has_more": has_more,
    })
}

/// Mounts `list_folder` returning a single, final page.
pub async fn mount_list_single_page(server: &MockServer, entries: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path(LIST_FOLDER))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(page(entries, "cursor-end", false)),
        )
        .mount(server)
        .await;
}

/// Mounts `list_folder` returning page 1 with `has_more`, and
/// `list_folder/continue` returning page 2 for the matching cursor.
pub async fn mount_list_paginated(
    server: &MockServer,
    page1_entries: serde_json::Value,
    page2_entries: serde_json::Value,
) {
    Mock::given(method("POST"))
        .and(path(LIST_FOLDER))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(page(page1_entries, "cursor-1", true)),
        )
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path(LIST_FOLDER_CONTINUE))
        .and(body_partial_json(serde_json::json!({ "cursor": "cursor-1" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(page(page2_entries, "cursor-2", false)),
        )
        .expect(1)
        .mount(server)
        .await;
}

/// Mounts a download endpoint returning `content` for any path.
pub async fn mount_download(server: &MockServer, content: &[u8]) {
    Mock::given(method("POST"))
        .and(path(DOWNLOAD))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(content.to_vec())
                .append_header("Content-Type", "application/octet-stream"),
        )
        .mount(server)
        .await;
}
