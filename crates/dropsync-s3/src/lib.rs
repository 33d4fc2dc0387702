//! dropsync S3 - Amazon S3 destination adapter
//!
//! Implements [`IDestinationStore`](dropsync_core::ports::IDestinationStore)
//! on top of `aws-sdk-s3`. Works against AWS and S3-compatible services
//! (custom endpoint plus path-style addressing).
//!
//! ## Modules
//!
//! - [`content_type`] - Content-Type inference from key extensions
//! - [`store`] - [`S3DestinationStore`](store::S3DestinationStore) and its settings

pub mod content_type;
pub mod store;

use thiserror::Error;

/// Errors raised by the S3 destination adapter
#[derive(Debug, Error)]
pub enum S3StoreError {
    /// An S3 API call failed
    #[error("{operation} failed for '{key}': {message}")]
    Request {
        operation: &'static str,
        key: String,
        message: String,
    },

    /// Local spooling of upload content failed
    #[error("Failed to buffer content for '{key}': {source}")]
    Spool {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// The service replied without a field the protocol requires
    #[error("Invalid response from {operation} for '{key}': {message}")]
    InvalidResponse {
        operation: &'static str,
        key: String,
        message: String,
    },
}

impl S3StoreError {
    pub(crate) fn request<E>(operation: &'static str, key: &str, err: E) -> Self
    where
        E: std::error::Error,
    {
        Self::Request {
            operation,
            key: key.to_string(),
            message: aws_sdk_s3::error::DisplayErrorContext(err).to_string(),
        }
    }

    pub(crate) fn spool(key: &str, source: std::io::Error) -> Self {
        Self::Spool {
            key: key.to_string(),
            source,
        }
    }
}
