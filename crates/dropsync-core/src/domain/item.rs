//! Source items, destination metadata and the upload decision
//!
//! A [`SourceItem`] describes one file found under the source root. A
//! [`DestinationObjectMeta`] is what the destination knows about a key.
//! [`SourceItem::upload_decision`] compares the two.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Name recorded as the origin system in provenance metadata
pub const DEFAULT_ORIGIN: &str = "dropbox";

/// Metadata key holding the origin system name
pub const META_SOURCE: &str = "source";

/// Metadata key holding the source modification timestamp
pub const META_SOURCE_MODIFIED: &str = "source-modified";

// ============================================================================
// SourceItem
// ============================================================================

/// A file under the source root
///
/// Directories are never represented. `relative_path` uses forward slashes
/// and has no leading slash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceItem {
    /// Full path in the drive, used for downloads (e.g. `/Apps/data/a.txt`)
    pub absolute_path: String,
    /// Path relative to the source root (e.g. `a.txt`)
    pub relative_path: String,
    /// Server-side modification time
    pub modified_at: DateTime<Utc>,
    /// File size in bytes
    pub size_bytes: u64,
}

/// Outcome of comparing a source item with the destination's copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadDecision {
    /// The destination has no object at the key
    Missing,
    /// The destination lacks a timestamp or size, so freshness is unknown
    IncompleteMetadata,
    /// The source was modified after the destination object
    SourceNewer,
    /// Sizes differ
    SizeChanged,
    /// Same size and the destination is not older than the source
    InSync,
}

impl UploadDecision {
    /// Returns true unless the destination is already in sync
    #[must_use]
    pub fn requires_upload(self) -> bool {
        !matches!(self, Self::InSync)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::IncompleteMetadata => "incomplete_metadata",
            Self::SourceNewer => "source_newer",
            Self::SizeChanged => "size_changed",
            Self::InSync => "in_sync",
        }
    }
}

impl SourceItem {
    /// Decides whether this item must be (re)uploaded over `meta`
    ///
    /// The time comparison is strict: equal timestamps with equal sizes
    /// count as in sync.
    #[must_use]
    pub fn upload_decision(&self, meta: Option<&DestinationObjectMeta>) -> UploadDecision {
        let Some(meta) = meta else {
            return UploadDecision::Missing;
        };

        let (Some(last_modified), Some(size)) = (meta.last_modified, meta.size_bytes) else {
            return UploadDecision::IncompleteMetadata;
        };

        if self.modified_at > last_modified {
            UploadDecision::SourceNewer
        } else if self.size_bytes != size {
            UploadDecision::SizeChanged
        } else {
            UploadDecision::InSync
        }
    }

    /// Provenance tags to store alongside this item's uploaded object
    #[must_use]
    pub fn provenance(&self, origin: &str) -> ProvenanceMetadata {
        ProvenanceMetadata {
            origin: origin.to_string(),
            source_modified: self.modified_at,
        }
    }
}

// ============================================================================
// DestinationObjectMeta
// ============================================================================

/// What the destination reports about an existing key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationObjectMeta {
    pub key: String,
    pub last_modified: Option<DateTime<Utc>>,
    pub size_bytes: Option<u64>,
}

// ============================================================================
// ProvenanceMetadata
// ============================================================================

/// Tags written with an uploaded object recording where it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceMetadata {
    /// Origin system name (e.g. "dropbox")
    pub origin: String,
    /// Modification time of the source file
    pub source_modified: DateTime<Utc>,
}

impl ProvenanceMetadata {
    /// RFC 3339 UTC timestamp with second precision, e.g. `2025-06-15T10:30:00Z`
    #[must_use]
    pub fn source_modified_string(&self) -> String {
        let modified = self.source_modified;
        modified.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    /// Metadata as key/value pairs ready for the object store
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        vec![
            (META_SOURCE.to_string(), self.origin.clone()),
            (
                META_SOURCE_MODIFIED.to_string(),
                self.source_modified_string(),
            ),
        ]
    }
}
