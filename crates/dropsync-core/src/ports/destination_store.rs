//! Destination store port (driven/secondary port)
//!
//! A flat key/value object namespace such as an S3 bucket.

use crate::domain::{DestinationObjectMeta, KeyPrefix, ProvenanceMetadata};

use super::source_lister::ContentStream;

/// Port trait for the destination object store
#[async_trait::async_trait]
pub trait IDestinationStore: Send + Sync {
    /// Fetch metadata for `key`
    ///
    /// Returns `Ok(None)` when no object exists at the key. Any other failure
    /// is an error.
    async fn head(&self, key: &str) -> anyhow::Result<Option<DestinationObjectMeta>>;

    /// Write `content` to `key`, replacing any existing object
    ///
    /// `provenance` is stored as object metadata.
    async fn put(
        &self,
        key: &str,
        content: ContentStream,
        provenance: &ProvenanceMetadata,
    ) -> anyhow::Result<()>;

    /// List every key that starts with `prefix`, across all pages
    async fn list_keys(&self, prefix: &KeyPrefix) -> anyhow::Result<Vec<String>>;

    /// Delete the object at `key`
    async fn delete(&self, key: &str) -> anyhow::Result<()>;
}
