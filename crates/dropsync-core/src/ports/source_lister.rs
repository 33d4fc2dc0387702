//! Source lister port (driven/secondary port)
//!
//! Enumerates every file under a source root and streams file content.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because errors at port boundaries are adapter-specific
//!   and don't need domain-level classification.
//! - Pagination is the adapter's concern: `list_all` returns only once every
//!   page has been fetched, or fails as a whole.

use std::io;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::Stream;

use crate::domain::{SourceItem, SourceRoot};

/// File content as an async byte stream
pub type ContentStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// Port trait for the source drive
#[async_trait::async_trait]
pub trait ISourceLister: Send + Sync {
    /// List every file (not folder) under `root`, recursively
    ///
    /// Each returned item carries a forward-slash `relative_path` with the
    /// root stripped. A failure on any page fails the whole listing.
    async fn list_all(&self, root: &SourceRoot) -> anyhow::Result<Vec<SourceItem>>;

    /// Open the content of the file at `absolute_path` as a byte stream
    async fn download(&self, absolute_path: &str) -> anyhow::Result<ContentStream>;
}
