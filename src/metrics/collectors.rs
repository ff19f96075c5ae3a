//! Custom metric collectors for pipeline operations.
//!
//! This module provides a high-level interface for recording various metrics
//! throughout the application. The `MetricsCollector` struct wraps the raw
//! Prometheus metrics and provides convenient methods for common operations.

use super::prometheus::{
    CYCLES_ABORTED_TOTAL, INDEXED_OFFERS_TOTAL, INDEXING_BATCH_DURATION, QUEUE_DEPTH,
    RECONCILIATION_PAGES_TOTAL, SEARCH_REQUESTS_TOTAL, SYNC_JOBS_IN_FLIGHT, SYNC_LAUNCHES_TOTAL,
};

/// Metrics collector for recording pipeline operational metrics.
///
/// Wraps the underlying Prometheus metrics and ensures consistent
/// labeling. Every method is a no-op until [`init_metrics`] has been
/// called, so library users who do not care about metrics pay nothing.
///
/// [`init_metrics`]: super::init_metrics
///
/// # Example
///
/// ```ignore
/// use offersync::metrics::{init_metrics, MetricsCollector};
///
/// init_metrics().expect("Failed to init metrics");
/// let collector = MetricsCollector::new();
///
/// collector.record_indexed("add", 120);
/// collector.update_queue_depth("offer_ids", 42);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector;

impl MetricsCollector {
    /// Create a new MetricsCollector instance.
    ///
    /// Note: Metrics must be initialized with `init_metrics()` before
    /// calling any recording methods.
    pub fn new() -> Self {
        Self
    }

    /// Record offers processed by the indexing pipeline.
    ///
    /// `operation` is one of "add", "update", "remove", "skip".
    pub fn record_indexed(&self, operation: &str, count: usize) {
        if count == 0 {
            return;
        }

        if let Some(indexed) = INDEXED_OFFERS_TOTAL.get() {
            indexed
                .with_label_values(&[operation])
                .inc_by(count as f64);
        }

        tracing::trace!(operation = operation, count = count, "Recorded indexing metric");
    }

    /// Record the duration of one indexing batch.
    pub fn record_batch_duration(&self, duration_secs: f64) {
        if let Some(duration) = INDEXING_BATCH_DURATION.get() {
            duration.observe(duration_secs);
        }
    }

    /// Update the depth gauge for one work queue.
    pub fn update_queue_depth(&self, kind: &str, depth: usize) {
        if let Some(queue_depth) = QUEUE_DEPTH.get() {
            queue_depth.with_label_values(&[kind]).set(depth as f64);
        }

        tracing::trace!(kind = kind, depth = depth, "Updated queue depth metric");
    }

    /// Record one catalog page walked by a reconciliation mode.
    pub fn record_page(&self, mode: &str) {
        if let Some(pages) = RECONCILIATION_PAGES_TOTAL.get() {
            pages.with_label_values(&[mode]).inc();
        }
    }

    /// Record a request sent to the search engine.
    pub fn record_search_request(&self, operation: &str, success: bool) {
        let status = if success { "success" } else { "failure" };

        if let Some(requests) = SEARCH_REQUESTS_TOTAL.get() {
            requests.with_label_values(&[operation, status]).inc();
        }

        tracing::trace!(
            operation = operation,
            status = status,
            "Recorded search request metric"
        );
    }

    /// Record a reconciliation cycle aborted by an error.
    pub fn record_cycle_aborted(&self) {
        if let Some(aborted) = CYCLES_ABORTED_TOTAL.get() {
            aborted.inc();
        }
    }

    /// Record a provider synchronization launch attempt.
    pub fn record_sync_launch(&self, success: bool) {
        let status = if success { "success" } else { "failure" };

        if let Some(launches) = SYNC_LAUNCHES_TOTAL.get() {
            launches.with_label_values(&[status]).inc();
        }
    }

    /// Update the count of synchronization jobs currently running.
    pub fn update_sync_jobs_in_flight(&self, count: usize) {
        if let Some(in_flight) = SYNC_JOBS_IN_FLIGHT.get() {
            in_flight.set(count as f64);
        }

        tracing::trace!(count = count, "Updated sync jobs in flight metric");
    }

    /// Increment the count of synchronization jobs in flight by 1.
    pub fn inc_sync_jobs_in_flight(&self) {
        if let Some(in_flight) = SYNC_JOBS_IN_FLIGHT.get() {
            in_flight.inc();
        }
    }

    /// Decrement the count of synchronization jobs in flight by 1.
    pub fn dec_sync_jobs_in_flight(&self) {
        if let Some(in_flight) = SYNC_JOBS_IN_FLIGHT.get() {
            in_flight.dec();
        }
    }
}
