//! Dropbox HTTP API client
//!
//! Wraps `reqwest::Client` with bearer authentication, the optional team
//! headers and HTTP status mapping. Dropbox exposes two hosts: RPC calls go
//! to the API host and file content goes to the content host.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use dropsync_dropbox::client::DropboxClient;
//!
//! let client = DropboxClient::new("access-token-here")
//!     .with_root_namespace("1234567")
//!     .with_member_id("dbmid:AAA");
//! ```

use std::sync::RwLock;
use std::time::Duration;

use reqwest::{header::RETRY_AFTER, Client, RequestBuilder, Response, StatusCode};
use tracing::{debug, info, warn};

use crate::DropboxError;

/// Base URL for RPC-style endpoints
const API_BASE_URL: &str = "https://api.dropboxapi.com";

/// Base URL for content upload/download endpoints
const CONTENT_BASE_URL: &str = "https://content.dropboxapi.com";

/// Wait used when a 429 response carries no usable `Retry-After`
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(5);

/// Upper bound on a server-requested wait
const MAX_RETRY_AFTER: Duration = Duration::from_secs(300);

/// Total attempts for a request that keeps receiving 429
const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Selects the namespace paths are resolved against
pub const PATH_ROOT_HEADER: &str = "Dropbox-API-Path-Root";

/// Selects the team member a team-scoped token acts as
pub const SELECT_USER_HEADER: &str = "Dropbox-API-Select-User";

/// Carries JSON arguments for content endpoints
pub const API_ARG_HEADER: &str = "Dropbox-API-Arg";

// ============================================================================
// DropboxClient
// ============================================================================

/// HTTP client for Dropbox API calls
pub struct DropboxClient {
    client: Client,
    api_url: String,
    content_url: String,
    access_token: RwLock<String>,
    root_namespace_id: Option<String>,
    member_id: Option<String>,
    max_attempts: u32,
}

impl DropboxClient {
    /// Creates a new DropboxClient with the given access token
    pub fn new(access_token: impl Into<String>) -> Self {
        Self::with_base_urls(access_token, API_BASE_URL, CONTENT_BASE_URL)
    }

    /// Creates a new DropboxClient with custom hosts (useful for testing)
    pub fn with_base_urls(
        access_token: impl Into<String>,
        api_url: impl Into<String>,
        content_url: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.into(),
            content_url: content_url.into(),
            access_token: RwLock::new(access_token.into()),
            root_namespace_id: None,
            member_id: None,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Resolve paths against a team root namespace
    pub fn with_root_namespace(mut self, namespace_id: impl Into<String>) -> Self {
        self.root_namespace_id = Some(namespace_id.into());
        self
    }

    /// Act as the given team member
    pub fn with_member_id(mut self, member_id: impl Into<String>) -> Self {
        self.member_id = Some(member_id.into());
        self
    }

    /// Override the number of attempts made for throttled requests (minimum 1)
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Updates the access token (e.g., after a token refresh)
    ///
    /// Requests built afterwards use the new token.
    pub fn set_access_token(&self, token: impl Into<String>) {
        let token = token.into();
        match self.access_token.write() {
            Ok(mut guard) => *guard = token,
            Err(poisoned) => *poisoned.into_inner() = token,
        }
        debug!("Updated DropboxClient access token");
    }

    pub fn access_token(&self) -> String {
        match self.access_token.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn root_namespace_id(&self) -> Option<&str> {
        self.root_namespace_id.as_deref()
    }

    pub fn member_id(&self) -> Option<&str> {
        self.member_id.as_deref()
    }

    /// Authenticated POST to an RPC endpoint, e.g. `/2/files/list_folder`
    pub fn api_request(&self, path: &str) -> RequestBuilder {
        self.post(&format!("{}{}", self.api_url, path))
    }

    /// Authenticated POST to a content endpoint, e.g. `/2/files/download`
    pub fn content_request(&self, path: &str) -> RequestBuilder {
        self.post(&format!("{}{}", self.content_url, path))
    }

    fn post(&self, url: &str) -> RequestBuilder {
        let mut builder = self.client.post(url).bearer_auth(self.access_token());
        if let Some(namespace_id) = &self.root_namespace_id {
            builder = builder.header(PATH_ROOT_HEADER, path_root_header(namespace_id));
        }
        if let Some(member_id) = &self.member_id {
            builder = builder.header(SELECT_USER_HEADER, member_id.as_str());
        }
        builder
    }

    /// Sends the request produced by `build`, retrying on HTTP 429.
    ///
    /// `build` is called once per attempt. The wait between attempts follows
    /// the `Retry-After` header. Non-success statuses other than 429 are
    /// mapped to [`DropboxError`] without retrying.
    pub async fn send_with_retry<F>(
        &self,
        endpoint: &str,
        build: F,
    ) -> Result<Response, DropboxError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut retry_after = DEFAULT_RETRY_AFTER;

        for attempt in 1..=self.max_attempts {
            let response = build().send().await?;

            if response.status() != StatusCode::TOO_MANY_REQUESTS {
                if attempt > 1 {
                    info!(endpoint, attempt, "Request succeeded after retry");
                }
                return check_status(response).await;
            }

            retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(|v| parse_retry_after(v, DEFAULT_RETRY_AFTER))
                .unwrap_or(DEFAULT_RETRY_AFTER);

            if attempt == self.max_attempts {
                warn!(endpoint, attempts = attempt, "429 retry limit exhausted");
                break;
            }

            info!(
                endpoint,
                attempt,
                retry_after_ms = retry_after.as_millis() as u64,
                "Received 429, backing off"
            );
            tokio::time::sleep(retry_after).await;
        }

        Err(DropboxError::TooManyRequests { retry_after })
    }
}

/// Maps a non-success response to a [`DropboxError`]
pub(crate) async fn check_status(response: Response) -> Result<Response, DropboxError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::UNAUTHORIZED => DropboxError::Unauthorized(body),
        // Endpoint errors arrive as 409 with a tagged summary such as
        // "path/not_found/.."
        StatusCode::CONFLICT if body.contains("not_found") => DropboxError::NotFound(body),
        s if s.is_server_error() => DropboxError::ServerError(format!("{s}: {body}")),
        s => DropboxError::Api {
            status: s.as_u16(),
            body,
        },
    })
}

/// Value of the `Dropbox-API-Path-Root` header for a namespace
pub fn path_root_header(namespace_id: &str) -> String {
    serde_json::json!({
        ".tag": "namespace_id",
        "namespace_id": namespace_id,
    })
    .to_string()
}

/// Serializes `value` for the `Dropbox-API-Arg` header.
///
/// HTTP headers must be ASCII, so every non-ASCII character (and DEL) is
/// written as a JSON `\uXXXX` escape.
pub fn api_arg_header(value: &serde_json::Value) -> String {
    let json = value.to_string();
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        if c.is_ascii() && c != '\x7f' {
            out.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{unit:04x}"));
            }
        }
    }
    out
}

/// Parses a `Retry-After` value given in seconds or as an HTTP date.
///
/// Falls back to `default` when the value is unusable. Never exceeds five
/// minutes.
pub fn parse_retry_after(value: &str, default: Duration) -> Duration {
    if let Ok(seconds) = value.trim().parse::<u64>() {
        return Duration::from_secs(seconds).min(MAX_RETRY_AFTER);
    }

    if let Ok(date) = chrono::DateTime::parse_from_rfc2822(value.trim()) {
        let wait = date.with_timezone(&chrono::Utc) - chrono::Utc::now();
        if let Ok(wait) = wait.to_std() {
            return wait.min(MAX_RETRY_AFTER);
        }
        return Duration::ZERO;
    }

    warn!(value, "Could not parse Retry-After header, using default");
    default
}
