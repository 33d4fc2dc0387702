//! dropsync Sync - One-way reconciliation engine
//!
//! Provides:
//! - A single reconciliation pass from a source drive to a destination bucket
//! - Bounded per-key concurrency with fail-fast error handling
//! - Cooperative cancellation of an in-flight pass
//! - Fixed-interval scheduling of repeated passes
//!
//! ## Modules
//!
//! - [`engine`] - [`Reconciler`](engine::Reconciler) running one pass
//! - [`scheduler`] - [`PassScheduler`](scheduler::PassScheduler) repeating passes

pub mod engine;
pub mod scheduler;

use thiserror::Error;

/// Reasons a reconciliation pass did not complete
///
/// The first failure ends the pass. Nothing after the failing step runs, so
/// an upload failure never leads to deletions.
#[derive(Debug, Error)]
pub enum PassError {
    /// Enumerating the source failed; nothing was mutated
    #[error("Failed to list source: {source:#}")]
    SourceList {
        #[source]
        source: anyhow::Error,
    },

    /// Inspecting an existing destination object failed
    #[error("Failed to inspect '{key}': {source:#}")]
    Inspect {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// Downloading or storing an object failed
    #[error("Failed to upload '{key}': {source:#}")]
    Upload {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// Listing destination keys failed; nothing was deleted
    #[error("Failed to list destination: {source:#}")]
    DestinationList {
        #[source]
        source: anyhow::Error,
    },

    /// Deleting a stale destination object failed
    #[error("Failed to delete '{key}': {source:#}")]
    Delete {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// The cancellation token fired before the pass finished
    #[error("Pass cancelled")]
    Cancelled,

    /// Another pass is running on the same reconciler
    #[error("A pass is already running")]
    AlreadyRunning,
}

impl PassError {
    /// The destination key involved in the failure, if any
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Inspect { key, .. } | Self::Upload { key, .. } | Self::Delete { key, .. } => {
                Some(key)
            }
            _ => None,
        }
    }

    /// Short machine-readable name of the failure kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SourceList { .. } => "source_list",
            Self::Inspect { .. } => "inspect",
            Self::Upload { .. } => "upload",
            Self::DestinationList { .. } => "destination_list",
            Self::Delete { .. } => "delete",
            Self::Cancelled => "cancelled",
            Self::AlreadyRunning => "already_running",
        }
    }
}
