//! Recursive folder listing for Dropbox
//!
//! Dropbox returns a folder tree as a sequence of pages:
//!
//! 1. **First page**: `POST /2/files/list_folder` with `recursive: true`
//! 2. **Follow pages**: while `has_more` is set, `POST /2/files/list_folder/continue`
//!    with the cursor from the previous page
//!
//! Only file entries become [`SourceItem`]s; folders and deleted entries are
//! dropped.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use dropsync_core::domain::SourceRoot;
//! use dropsync_dropbox::client::DropboxClient;
//! use dropsync_dropbox::listing;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = DropboxClient::new("access-token");
//! let root = SourceRoot::new("/Apps/data")?;
//! let items = listing::list_all(&client, &root).await?;
//! println!("Got {} files", items.len());
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use dropsync_core::domain::{SourceItem, SourceRoot};

use crate::client::DropboxClient;
use crate::DropboxError;

const LIST_FOLDER_PATH: &str = "/2/files/list_folder";
const LIST_FOLDER_CONTINUE_PATH: &str = "/2/files/list_folder/continue";

// ============================================================================
// Dropbox API response types (JSON deserialization)
// ============================================================================

/// One page of a folder listing
///
/// See: <https://www.dropbox.com/developers/documentation/http/documentation#files-list_folder>
#[derive(Debug, Deserialize)]
struct ListFolderResult {
    #[serde(default)]
    entries: Vec<Entry>,
    cursor: String,
    #[serde(default)]
    has_more: bool,
}

/// Listing entry, discriminated by its `.tag`
#[derive(Debug, Deserialize)]
#[serde(tag = ".tag")]
enum Entry {
    #[serde(rename = "file")]
    File(FileEntry),
    /// Folders, deleted entries and any tag added later
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct FileEntry {
    path_display: Option<String>,
    path_lower: Option<String>,
    server_modified: DateTime<Utc>,
    #[serde(default)]
    size: u64,
}

// ============================================================================
// ListingParser
// ============================================================================

/// Converts listing pages into [`SourceItem`]s relative to a root
pub struct ListingParser;

impl ListingParser {
    fn parse_entry(entry: Entry, root: &SourceRoot) -> Option<SourceItem> {
        let Entry::File(file) = entry else {
            return None;
        };

        // path_display keeps the user's casing; path_lower is the fallback
        let Some(absolute_path) = file.path_display.or(file.path_lower) else {
            warn!("Skipping file entry without a path");
            return None;
        };

        let relative_path = root.relative_path(&absolute_path);
        if relative_path.is_empty() {
            warn!(path = %absolute_path, "Skipping entry that resolves to the source root");
            return None;
        }

        Some(SourceItem {
            absolute_path,
            relative_path,
            modified_at: file.server_modified,
            size_bytes: file.size,
        })
    }

    fn parse_page(page: ListFolderResult, root: &SourceRoot, out: &mut Vec<SourceItem>) {
        out.extend(
            page.entries
                .into_iter()
                .filter_map(|entry| Self::parse_entry(entry, root)),
        );
    }
}

// ============================================================================
// Listing functions
// ============================================================================

/// Lists every file under `root`, following `has_more` pages to the end.
///
/// # Errors
///
/// Returns the first page failure; no partial result is returned.
pub async fn list_all(
    client: &DropboxClient,
    root: &SourceRoot,
) -> Result<Vec<SourceItem>, DropboxError> {
    debug!(root = %root, "Starting folder listing");

    let body = serde_json::json!({
        "path": root.as_api_path(),
        "recursive": true,
        "include_deleted": false,
    });
    let mut page = fetch_page(client, LIST_FOLDER_PATH, &body).await?;

    let mut items = Vec::new();
    let mut page_count: u32 = 1;

    loop {
        let has_more = page.has_more;
        let cursor = std::mem::take(&mut page.cursor);
        let before = items.len();
        ListingParser::parse_page(page, root, &mut items);

        debug!(
            page = page_count,
            files = items.len() - before,
            has_more,
            "Received listing page"
        );

        if !has_more {
            break;
        }
        if cursor.is_empty() {
            return Err(DropboxError::InvalidResponse(
                "has_more set without a cursor".to_string(),
            ));
        }

        page_count += 1;
        let body = serde_json::json!({ "cursor": cursor });
        page = fetch_page(client, LIST_FOLDER_CONTINUE_PATH, &body).await?;
    }

    debug!(
        total_files = items.len(),
        total_pages = page_count,
        "Folder listing complete"
    );

    Ok(items)
}

async fn fetch_page(
    client: &DropboxClient,
    endpoint: &str,
    body: &serde_json::Value,
) -> Result<ListFolderResult, DropboxError> {
    let response = client
        .send_with_retry(endpoint, || client.api_request(endpoint).json(body))
        .await?;

    response
        .json::<ListFolderResult>()
        .await
        .map_err(|e| DropboxError::InvalidResponse(format!("{endpoint}: {e}")))
}

// ============================================================================
// Tests
// ============================================================================
