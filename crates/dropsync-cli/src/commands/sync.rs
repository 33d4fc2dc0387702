//! Sync command - Run one reconciliation pass
//!
//! Provides the `dropsync sync` CLI command which:
//! 1. Validates the loaded configuration
//! 2. Authenticates against Dropbox and connects to S3
//! 3. Runs a single pass and displays the report
//!
//! A failed pass makes the process exit non-zero.

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use dropsync_core::config::Config;

use crate::output::{get_formatter, OutputFormat};
use crate::setup;

/// Sync command with clap options
#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Show what would be uploaded and deleted without making changes
    #[arg(long)]
    pub dry_run: bool,
}

impl SyncCommand {
    /// Execute the sync command
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);

        setup::ensure_valid(config)?;
        let root = config.source_root()?;
        let prefix = config.key_prefix();

        let reconciler = setup::build_reconciler(config, self.dry_run).await?;
        let cancel = setup::cancel_on_signal();

        if self.dry_run {
            formatter.info("Dry run mode - no changes will be made");
        }
        let bucket = &config.destination.bucket;
        formatter.info(&format!("Mirroring {root} to s3://{bucket}/{prefix}"));

        let report = reconciler
            .run_pass(&root, &prefix, &cancel)
            .await
            .context("Reconciliation pass failed")?;

        info!(
            uploaded = report.uploaded.len(),
            deleted = report.deleted.len(),
            "Sync finished"
        );
        formatter.report(&report);

        Ok(())
    }
}
