//! Pass scheduler - runs reconciliation passes on a fixed interval
//!
//! The [`PassScheduler`] drives a shared [`Reconciler`] until its
//! cancellation token fires.
//!
//! ## Flow
//!
//! ```text
//! interval tick ──→ run_pass ──→ on_pass callback ──→ wait for next tick
//!                      │
//!                 failure is logged, loop continues
//! ```
//!
//! Ticks that elapse while a pass is running are delayed rather than
//! replayed, so passes never overlap or run back to back to catch up.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use dropsync_core::domain::{KeyPrefix, SourceRoot};

use crate::engine::{PassReport, Reconciler};
use crate::PassError;

/// Shortest accepted interval between pass starts
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Outcome counts of a scheduler run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub passes_succeeded: u64,
    pub passes_failed: u64,
}

/// Repeats reconciliation passes on a fixed interval
pub struct PassScheduler {
    reconciler: Arc<Reconciler>,
    root: SourceRoot,
    prefix: KeyPrefix,
    interval: Duration,
}

impl PassScheduler {
    pub fn new(
        reconciler: Arc<Reconciler>,
        root: SourceRoot,
        prefix: KeyPrefix,
        interval: Duration,
    ) -> Self {
        let interval = interval.max(MIN_INTERVAL);
        info!(
            interval_secs = interval.as_secs(),
            root = %root,
            prefix = %prefix,
            "Creating pass scheduler"
        );

        Self {
            reconciler,
            root,
            prefix,
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Main loop: the first pass starts immediately
    ///
    /// `on_pass` sees the outcome of every pass that ran to completion or
    /// failed. A pass interrupted by `cancel` ends the loop without being
    /// reported.
    pub async fn run<F>(&self, cancel: &CancellationToken, mut on_pass: F) -> SchedulerStats
    where
        F: FnMut(&Result<PassReport, PassError>),
    {
        info!("Pass scheduler starting");

        let mut stats = SchedulerStats::default();
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let outcome = self
                .reconciler
                .run_pass(&self.root, &self.prefix, cancel)
                .await;

            match &outcome {
                Ok(_) => stats.passes_succeeded += 1,
                Err(PassError::Cancelled) => break,
                Err(err) => {
                    stats.passes_failed += 1;
                    error!(
                        error = %err,
                        kind = err.kind(),
                        key = err.key(),
                        "Pass failed; retrying on next tick"
                    );
                }
            }

            on_pass(&outcome);
        }

        info!(
            succeeded = stats.passes_succeeded,
            failed = stats.passes_failed,
            "Pass scheduler stopped"
        );
        stats
    }
}
