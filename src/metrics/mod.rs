//! Metrics module for Prometheus-based monitoring.
//!
//! This module provides metrics collection and export for pipeline
//! operations: index writes, queue depths, reconciliation progress, and
//! provider synchronization jobs.
//!
//! # Example
//!
//! ```ignore
//! use offersync::metrics::{init_metrics, export_metrics, MetricsCollector};
//!
//! // Initialize metrics on startup
//! init_metrics().expect("Failed to initialize metrics");
//!
//! // Create a collector for recording metrics
//! let collector = MetricsCollector::new();
//!
//! // Record an indexing pass
//! collector.record_indexed("add", 120);
//!
//! // Export metrics for Prometheus scraping
//! let metrics_text = export_metrics();
//! ```

pub mod collectors;
pub mod prometheus;

// Re-export key types for convenient access
pub use collectors::MetricsCollector;
pub use prometheus::{export_metrics, init_metrics};

// Re-export metric constants for direct access when needed
pub use prometheus::{
    CYCLES_ABORTED_TOTAL, INDEXED_OFFERS_TOTAL, INDEXING_BATCH_DURATION, QUEUE_DEPTH,
    RECONCILIATION_PAGES_TOTAL, REGISTRY, SEARCH_REQUESTS_TOTAL, SYNC_JOBS_IN_FLIGHT,
    SYNC_LAUNCHES_TOTAL,
};
