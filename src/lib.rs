//! offersync: offer search synchronization pipeline.
//!
//! Keeps a search index consistent with the offer catalog: Redis lists
//! buffer reindexation work, a pure evaluator decides each offer's
//! fate, a paged driver reconciles in bounded batches, and a bounded
//! dispatcher launches provider sync containers.

// Core modules
pub mod catalog;
pub mod cli;
pub mod config;
pub mod indexing;
pub mod metrics;
pub mod queue;
pub mod search;
pub mod sync;
pub mod utils;

// Re-export commonly used types
pub use config::{ConfigError, SyncConfig};
pub use indexing::{
    IndexingError, IndexingOrchestrator, IndexingReport, ReconciliationDriver,
    ReconciliationReport,
};
pub use queue::{EnqueueReason, QueueError, WorkKind};
