//! Bounded dispatcher draining pending sync targets into container jobs.
//!
//! The dispatcher pops targets from a pending list and launches one
//! container per target, never letting more than the configured pool
//! size run at once. A marker per target tracks the window from launch
//! to observed terminal state; a background task clears the marker when
//! the job finishes, so a full pool drains itself without operator
//! intervention. When the pool is full the dispatcher holds the popped
//! target and re-checks after a fixed wait interval rather than pushing
//! it back, preserving pop order under a single dispatcher per list.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::SyncConfig;
use crate::metrics::MetricsCollector;
use crate::queue::QueueError;
use crate::sync::launcher::JobLauncher;
use crate::sync::pending::{PendingSyncs, SyncTarget};

/// Counters from one dispatcher cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Jobs successfully launched.
    pub launched: usize,
    /// Targets whose launch failed and were dropped.
    pub failed: usize,
    /// Targets skipped because a job for them was already in flight.
    pub skipped_duplicates: usize,
}

/// Drains one pending list, launching at most `pool_size` jobs at once.
pub struct BoundedSyncDispatcher<T: SyncTarget> {
    pending: Arc<dyn PendingSyncs<T>>,
    launcher: Arc<dyn JobLauncher>,
    config: SyncConfig,
    in_flight: Arc<Mutex<HashSet<String>>>,
    metrics: MetricsCollector,
}

impl<T: SyncTarget> BoundedSyncDispatcher<T> {
    pub fn new(
        pending: Arc<dyn PendingSyncs<T>>,
        launcher: Arc<dyn JobLauncher>,
        config: SyncConfig,
    ) -> Self {
        Self {
            pending,
            launcher,
            config,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            metrics: MetricsCollector::new(),
        }
    }

    /// Number of targets whose jobs are currently in flight.
    pub async fn in_flight_count(&self) -> usize {
        self.in_flight.lock().await.len()
    }

    /// Drains the pending list until it is empty.
    ///
    /// Launched jobs keep running after the cycle returns; only the
    /// launching itself is synchronous with the cycle.
    pub async fn run_cycle(&self) -> Result<DispatchReport, QueueError> {
        let mut report = DispatchReport::default();
        let mut held: Option<T> = None;

        loop {
            let target = match held.take() {
                Some(target) => target,
                None => match self.pending.pop_head().await? {
                    Some(target) => target,
                    None => break,
                },
            };

            let in_flight = self.in_flight_count().await;
            if in_flight >= self.config.provider_sync_pool_size {
                tracing::info!(
                    in_flight,
                    pool_size = self.config.provider_sync_pool_size,
                    "Sync pool is full, waiting for a free slot"
                );
                held = Some(target);
                tokio::time::sleep(self.config.provider_sync_wait_interval).await;
                continue;
            }

            self.launch_one(target, &mut report).await;
        }

        tracing::info!(
            launched = report.launched,
            failed = report.failed,
            skipped_duplicates = report.skipped_duplicates,
            "Finished sync dispatch cycle"
        );
        Ok(report)
    }

    async fn launch_one(&self, target: T, report: &mut DispatchReport) {
        let marker = target.marker_key();

        {
            let mut in_flight = self.in_flight.lock().await;
            if !in_flight.insert(marker.clone()) {
                tracing::info!(
                    target = %target.describe(),
                    "Sync already in flight for target, skipping"
                );
                report.skipped_duplicates += 1;
                return;
            }
        }
        self.metrics.inc_sync_jobs_in_flight();

        let spec = target.job_spec(&self.config);
        match self.launcher.launch(&spec).await {
            Ok(handle) => {
                report.launched += 1;
                self.metrics.record_sync_launch(true);
                tracing::info!(
                    target = %target.describe(),
                    container_id = %handle.container_id,
                    "Launched sync job"
                );

                let launcher = Arc::clone(&self.launcher);
                let in_flight = Arc::clone(&self.in_flight);
                let metrics = self.metrics.clone();
                let label = target.describe();
                tokio::spawn(async move {
                    match launcher.wait(handle).await {
                        Ok(outcome) if outcome.succeeded() => {
                            tracing::info!(target = %label, "Sync job completed");
                        }
                        Ok(outcome) => {
                            tracing::warn!(
                                target = %label,
                                exit_code = outcome.exit_code,
                                "Sync job exited with failure"
                            );
                        }
                        Err(err) => {
                            tracing::warn!(
                                target = %label,
                                error = %err,
                                "Could not observe sync job completion"
                            );
                        }
                    }
                    in_flight.lock().await.remove(&marker);
                    metrics.dec_sync_jobs_in_flight();
                });
            }
            Err(err) => {
                tracing::error!(
                    target = %target.describe(),
                    error = %err,
                    "Failed to launch sync job, dropping target"
                );
                report.failed += 1;
                self.metrics.record_sync_launch(false);
                self.in_flight.lock().await.remove(&marker);
                self.metrics.dec_sync_jobs_in_flight();
            }
        }
    }
}
