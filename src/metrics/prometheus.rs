//! Prometheus metrics registration and export.
//!
//! This module defines all Prometheus metrics used by the
//! synchronization pipeline and provides functions for initializing,
//! registering, and exporting them.

use prometheus::{
    Counter, CounterVec, Encoder, Gauge, GaugeVec, Histogram, Opts, Registry, TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all pipeline metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Index writes by operation (add, update, remove, skip).
pub static INDEXED_OFFERS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Duration of one indexing batch in seconds.
pub static INDEXING_BATCH_DURATION: OnceLock<Histogram> = OnceLock::new();

/// Number of items waiting in each work queue, labeled by kind.
pub static QUEUE_DEPTH: OnceLock<GaugeVec> = OnceLock::new();

/// Catalog pages walked per reconciliation mode.
pub static RECONCILIATION_PAGES_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Requests sent to the search engine, labeled by operation and status.
pub static SEARCH_REQUESTS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Provider synchronization jobs currently running.
pub static SYNC_JOBS_IN_FLIGHT: OnceLock<Gauge> = OnceLock::new();

/// Provider synchronization launches, labeled by status.
pub static SYNC_LAUNCHES_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Reconciliation cycles that were aborted by an error.
pub static CYCLES_ABORTED_TOTAL: OnceLock<Counter> = OnceLock::new();

/// Initialize all metrics and register them with the registry.
///
/// This function should be called once at application startup. Calling
/// it again is harmless: already-set statics are left untouched.
///
/// # Errors
///
/// Returns a `prometheus::Error` if metric registration fails, typically
/// due to duplicate metric names.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    let registry = Registry::new();

    let indexed_offers_total = CounterVec::new(
        Opts::new(
            "offersync_indexed_offers_total",
            "Offers processed by the indexing pipeline",
        ),
        &["operation"],
    )?;

    let indexing_batch_duration = Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "offersync_indexing_batch_duration_seconds",
            "Duration of one indexing batch in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0]),
    )?;

    let queue_depth = GaugeVec::new(
        Opts::new("offersync_queue_depth", "Number of items in each work queue"),
        &["kind"],
    )?;

    let reconciliation_pages_total = CounterVec::new(
        Opts::new(
            "offersync_reconciliation_pages_total",
            "Catalog pages walked per reconciliation mode",
        ),
        &["mode"],
    )?;

    let search_requests_total = CounterVec::new(
        Opts::new(
            "offersync_search_requests_total",
            "Requests sent to the search engine",
        ),
        &["operation", "status"],
    )?;

    let sync_jobs_in_flight = Gauge::new(
        "offersync_sync_jobs_in_flight",
        "Provider synchronization jobs currently running",
    )?;

    let sync_launches_total = CounterVec::new(
        Opts::new(
            "offersync_sync_launches_total",
            "Provider synchronization launches",
        ),
        &["status"],
    )?;

    let cycles_aborted_total = Counter::new(
        "offersync_cycles_aborted_total",
        "Reconciliation cycles aborted by an error",
    )?;

    registry.register(Box::new(indexed_offers_total.clone()))?;
    registry.register(Box::new(indexing_batch_duration.clone()))?;
    registry.register(Box::new(queue_depth.clone()))?;
    registry.register(Box::new(reconciliation_pages_total.clone()))?;
    registry.register(Box::new(search_requests_total.clone()))?;
    registry.register(Box::new(sync_jobs_in_flight.clone()))?;
    registry.register(Box::new(sync_launches_total.clone()))?;
    registry.register(Box::new(cycles_aborted_total.clone()))?;

    // Store metrics in static variables
    // If any of these fail, metrics were already initialized (idempotent)
    let _ = REGISTRY.set(registry);
    let _ = INDEXED_OFFERS_TOTAL.set(indexed_offers_total);
    let _ = INDEXING_BATCH_DURATION.set(indexing_batch_duration);
    let _ = QUEUE_DEPTH.set(queue_depth);
    let _ = RECONCILIATION_PAGES_TOTAL.set(reconciliation_pages_total);
    let _ = SEARCH_REQUESTS_TOTAL.set(search_requests_total);
    let _ = SYNC_JOBS_IN_FLIGHT.set(sync_jobs_in_flight);
    let _ = SYNC_LAUNCHES_TOTAL.set(sync_launches_total);
    let _ = CYCLES_ABORTED_TOTAL.set(cycles_aborted_total);

    tracing::info!("Prometheus metrics initialized successfully");

    Ok(())
}

/// Export all registered metrics in Prometheus text format.
///
/// Gathers all metrics from the registry and encodes them in the text
/// exposition format, suitable for scraping or printing.
pub fn export_metrics() -> String {
    let Some(registry) = REGISTRY.get() else {
        return "# Metrics not initialized. Call init_metrics() first.\n".to_string();
    };

    let encoder = TextEncoder::new();
    let metric_families = registry.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return format!("# Error encoding metrics: {}\n", e);
    }

    String::from_utf8(buffer)
        .unwrap_or_else(|e| format!("# Error converting metrics to UTF-8: {}\n", e))
}
