//! dropsync Dropbox - Dropbox HTTP API source adapter
//!
//! Provides async client for:
//! - OAuth2 refresh-token exchange for a short-lived access token
//! - Recursive folder listing with cursor pagination
//! - Streaming file downloads
//!
//! ## Modules
//!
//! - [`auth`] - Refresh-token grant against the Dropbox token endpoint
//! - [`client`] - Dropbox HTTP client (headers, status mapping, 429 retry)
//! - [`listing`] - `list_folder` / `list_folder/continue` pagination
//! - [`download`] - Streaming `files/download`
//! - [`provider`] - [`ISourceLister`](dropsync_core::ports::ISourceLister) implementation

pub mod auth;
pub mod client;
pub mod download;
pub mod listing;
pub mod provider;

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when communicating with the Dropbox API
#[derive(Debug, Error)]
pub enum DropboxError {
    /// The access token is invalid or expired
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The requested path does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limit still exceeded after all retries
    #[error("Too many requests, retry after {retry_after:?}")]
    TooManyRequests {
        /// Last requested wait before retrying
        retry_after: Duration,
    },

    /// Endpoint-specific error (HTTP 400 or 409)
    #[error("API error ({status}): {body}")]
    Api {
        status: u16,
        body: String,
    },

    /// A server-side error occurred (5xx)
    #[error("Server error: {0}")]
    ServerError(String),

    /// A network-level error occurred
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The API response could not be parsed or was malformed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}
