//! One-way reconciliation engine
//!
//! The [`Reconciler`] mirrors a source subtree into a destination prefix.
//!
//! ## Pass Flow
//!
//! 1. **Enumerate**: list every file under the source root
//! 2. **Map**: build the desired key set (`prefix + relative path`)
//! 3. **Upload**: per desired key, `head` the destination and upload when the
//!    object is missing, older, a different size, or lacks metadata
//! 4. **Delete**: list destination keys under the prefix and delete every key
//!    absent from the desired set
//!
//! Per-key work in steps 3 and 4 runs with bounded concurrency. The first
//! failure aborts the pass, so step 4 never runs after a failed upload.
//! Every collaborator call is raced against the cancellation token.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use futures_util::future::{BoxFuture, FutureExt};
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use dropsync_core::domain::{key_for, KeyPrefix, SourceItem, SourceRoot, DEFAULT_ORIGIN};
use dropsync_core::ports::{IDestinationStore, ISourceLister};

use crate::PassError;

/// Default number of keys processed concurrently
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

// ============================================================================
// ReconcilerOptions
// ============================================================================

/// Tunables for a [`Reconciler`]
#[derive(Debug, Clone)]
pub struct ReconcilerOptions {
    /// Plan the pass without issuing any upload or delete
    pub dry_run: bool,
    /// Upper bound on concurrent per-key operations (minimum 1)
    pub max_concurrency: usize,
    /// Value written to the `source` provenance metadata entry
    pub origin: String,
}

impl Default for ReconcilerOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            origin: DEFAULT_ORIGIN.to_string(),
        }
    }
}

// ============================================================================
// PassReport
// ============================================================================

/// Summary of a completed reconciliation pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct PassReport {
    /// Number of source files in the desired key set
    pub items_considered: usize,
    /// Keys uploaded (or that would be, in a dry run), sorted
    pub uploaded: Vec<String>,
    /// Desired keys already in sync
    pub unchanged: usize,
    /// Keys deleted (or that would be, in a dry run), sorted
    pub deleted: Vec<String>,
    /// Wall-clock duration of the pass in milliseconds
    pub duration_ms: u64,
    /// Whether mutations were suppressed
    pub dry_run: bool,
}

/// Result of reconciling one desired key
enum ItemOutcome {
    Uploaded,
    Unchanged,
}

// ============================================================================
// Reconciler
// ============================================================================

/// One-way mirror from a source lister to a destination store
///
/// ## Dependencies
///
/// - `source`: enumerates and downloads source files
/// - `destination`: inspects, writes, lists and deletes destination objects
///
/// At most one pass runs at a time per instance. A concurrent call to
/// [`run_pass`](Reconciler::run_pass) fails with [`PassError::AlreadyRunning`].
pub struct Reconciler {
    source: Arc<dyn ISourceLister>,
    destination: Arc<dyn IDestinationStore>,
    options: ReconcilerOptions,
    running: Mutex<()>,
}

impl Reconciler {
    pub fn new(
        source: Arc<dyn ISourceLister>,
        destination: Arc<dyn IDestinationStore>,
        options: ReconcilerOptions,
    ) -> Self {
        Self {
            source,
            destination,
            options,
            running: Mutex::new(()),
        }
    }

    /// Performs one reconciliation pass
    ///
    /// # Returns
    /// A [`PassReport`] when every step succeeded
    ///
    /// # Errors
    /// The first [`PassError`] encountered. Steps after the failing one do
    /// not run.
    #[tracing::instrument(skip(self, cancel), fields(dry_run = self.options.dry_run))]
    pub async fn run_pass(
        &self,
        root: &SourceRoot,
        prefix: &KeyPrefix,
        cancel: &CancellationToken,
    ) -> Result<PassReport, PassError> {
        let _guard = self
            .running
            .try_lock()
            .map_err(|_| PassError::AlreadyRunning)?;
        let start = Instant::now();

        info!(root = %root, prefix = %prefix, "Starting reconciliation pass");

        // Step 1: Enumerate the source
        let items = until_cancelled(cancel, self.source.list_all(root))
            .await?
            .map_err(|source| PassError::SourceList { source })?;

        // Step 2: Build the desired key set
        let desired = desired_key_set(prefix, items);
        debug!(keys = desired.len(), "Desired key set built");

        // Step 3: Upload missing or changed objects
        let (mut uploaded, unchanged) = self.upload_changed(&desired, cancel).await?;

        // Step 4: Delete stale objects under the prefix
        let mut deleted = self.delete_stale(prefix, &desired, cancel).await?;

        uploaded.sort();
        deleted.sort();

        let report = PassReport {
            items_considered: desired.len(),
            uploaded,
            unchanged,
            deleted,
            duration_ms: start.elapsed().as_millis() as u64,
            dry_run: self.options.dry_run,
        };

        info!(
            items_considered = report.items_considered,
            uploaded = report.uploaded.len(),
            unchanged = report.unchanged,
            deleted = report.deleted.len(),
            duration_ms = report.duration_ms,
            "Reconciliation pass complete"
        );

        Ok(report)
    }

    async fn upload_changed(
        &self,
        desired: &HashMap<String, SourceItem>,
        cancel: &CancellationToken,
    ) -> Result<(Vec<String>, usize), PassError> {
        let mut uploaded = Vec::new();
        let mut unchanged = 0;

        let entries: Vec<_> = desired
            .iter()
            .map(|(key, item)| self.reconcile_entry(key, item, cancel))
            .collect();
        let mut outcomes = stream::iter(entries).buffer_unordered(self.concurrency());

        while let Some(outcome) = outcomes.next().await {
            match outcome? {
                (key, ItemOutcome::Uploaded) => uploaded.push(key.to_string()),
                (_, ItemOutcome::Unchanged) => unchanged += 1,
            }
        }

        Ok((uploaded, unchanged))
    }

    /// Boxed per-key task so the pass future stays `Send`
    fn reconcile_entry<'a>(
        &'a self,
        key: &'a str,
        item: &'a SourceItem,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<(&'a str, ItemOutcome), PassError>> {
        async move {
            self.reconcile_item(key, item, cancel)
                .await
                .map(|outcome| (key, outcome))
        }
        .boxed()
    }

    async fn reconcile_item(
        &self,
        key: &str,
        item: &SourceItem,
        cancel: &CancellationToken,
    ) -> Result<ItemOutcome, PassError> {
        let meta = until_cancelled(cancel, self.destination.head(key))
            .await?
            .map_err(|source| PassError::Inspect {
                key: key.to_string(),
                source,
            })?;

        let decision = item.upload_decision(meta.as_ref());
        if !decision.requires_upload() {
            debug!(key, "Object in sync, skipping");
            return Ok(ItemOutcome::Unchanged);
        }

        if self.options.dry_run {
            info!(key, reason = decision.as_str(), "Would upload (dry run)");
            return Ok(ItemOutcome::Uploaded);
        }

        let upload_error = |source| PassError::Upload {
            key: key.to_string(),
            source,
        };

        let content = until_cancelled(cancel, self.source.download(&item.absolute_path))
            .await?
            .map_err(upload_error)?;
        let provenance = item.provenance(&self.options.origin);
        until_cancelled(cancel, self.destination.put(key, content, &provenance))
            .await?
            .map_err(upload_error)?;

        info!(
            key,
            reason = decision.as_str(),
            size = item.size_bytes,
            "Uploaded"
        );
        Ok(ItemOutcome::Uploaded)
    }

    async fn delete_stale(
        &self,
        prefix: &KeyPrefix,
        desired: &HashMap<String, SourceItem>,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, PassError> {
        let listed = until_cancelled(cancel, self.destination.list_keys(prefix))
            .await?
            .map_err(|source| PassError::DestinationList { source })?;

        let stale = stale_keys(prefix, listed, desired);
        debug!(stale = stale.len(), "Stale destination keys found");

        if self.options.dry_run {
            for key in &stale {
                info!(key = %key, "Would delete (dry run)");
            }
            return Ok(stale);
        }

        let mut deleted = Vec::with_capacity(stale.len());
        let mut results = stream::iter(stale)
            .map(|key| self.delete_key(key, cancel))
            .buffer_unordered(self.concurrency());

        while let Some(result) = results.next().await {
            deleted.push(result?);
        }

        Ok(deleted)
    }

    fn delete_key<'a>(
        &'a self,
        key: String,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<String, PassError>> {
        async move {
            until_cancelled(cancel, self.destination.delete(&key))
                .await?
                .map_err(|source| PassError::Delete {
                    key: key.clone(),
                    source,
                })?;
            info!(key = %key, "Deleted");
            Ok(key)
        }
        .boxed()
    }

    fn concurrency(&self) -> usize {
        self.options.max_concurrency.max(1)
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Awaits `fut` unless `cancel` fires first
async fn until_cancelled<F: Future>(
    cancel: &CancellationToken,
    fut: F,
) -> Result<F::Output, PassError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(PassError::Cancelled),
        output = fut => Ok(output),
    }
}

/// Maps source items to destination keys
///
/// Two items mapping to the same key keep the later one.
fn desired_key_set(prefix: &KeyPrefix, items: Vec<SourceItem>) -> HashMap<String, SourceItem> {
    let mut desired = HashMap::with_capacity(items.len());
    for item in items {
        let key = key_for(prefix, &item.relative_path);
        if let Some(previous) = desired.insert(key.clone(), item) {
            warn!(
                key = %key,
                replaced = %previous.absolute_path,
                "Duplicate source path; keeping the later entry"
            );
        }
    }
    desired
}

/// Listed keys under `prefix` with no desired counterpart, each once
fn stale_keys(
    prefix: &KeyPrefix,
    listed: Vec<String>,
    desired: &HashMap<String, SourceItem>,
) -> Vec<String> {
    let mut stale: Vec<String> = listed
        .into_iter()
        .filter(|key| prefix.contains(key) && !desired.contains_key(key))
        .collect();
    stale.sort();
    stale.dedup();
    stale
}
