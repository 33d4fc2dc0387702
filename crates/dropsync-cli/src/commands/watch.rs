//! Watch command - Run passes repeatedly until interrupted
//!
//! Failed passes are reported and the next pass still runs on schedule.
//! SIGINT or SIGTERM cancels the pass in flight and ends the loop.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use tracing::info;

use dropsync_core::config::Config;
use dropsync_sync::scheduler::PassScheduler;

use crate::output::{get_formatter, OutputFormat};
use crate::setup;

/// Interval used when neither `--interval` nor `sync.interval_secs` is set
pub const DEFAULT_INTERVAL_SECS: u64 = 300;

#[derive(Debug, Args)]
pub struct WatchCommand {
    /// Seconds between pass starts (overrides sync.interval_secs)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: Option<u64>,

    /// Plan every pass without making changes
    #[arg(long)]
    pub dry_run: bool,
}

impl WatchCommand {
    pub fn interval(&self, config: &Config) -> Duration {
        Duration::from_secs(
            self.interval
                .or(config.sync.interval_secs)
                .unwrap_or(DEFAULT_INTERVAL_SECS),
        )
    }

    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);

        setup::ensure_valid(config)?;
        let root = config.source_root()?;
        let prefix = config.key_prefix();
        let interval = self.interval(config);

        let reconciler = setup::build_reconciler(config, self.dry_run).await?;
        let cancel = setup::cancel_on_signal();

        formatter.info(&format!(
            "Watching {root} every {}s (Ctrl+C to stop)",
            interval.as_secs()
        ));

        let scheduler = PassScheduler::new(Arc::new(reconciler), root, prefix, interval);
        let stats = scheduler
            .run(&cancel, |outcome| match outcome {
                Ok(report) => formatter.report(report),
                Err(err) => formatter.error(&format!("{err}")),
            })
            .await;

        info!(
            succeeded = stats.passes_succeeded,
            failed = stats.passes_failed,
            "Watch stopped"
        );
        formatter.success(&format!(
            "Stopped after {} successful and {} failed passes",
            stats.passes_succeeded, stats.passes_failed
        ));

        Ok(())
    }
}
