//! Offer indexing pipeline.
//!
//! Three layers, leaves first: [`eligibility`] holds the pure reindex
//! decision and the projection used for change detection;
//! [`orchestrator`] applies decisions to the search index and the
//! snapshot store; [`reconciliation`] feeds the orchestrator from the
//! work queues and from paginated catalog walks.

pub mod eligibility;
pub mod orchestrator;
pub mod reconciliation;

pub use eligibility::{evaluate, project, Decision};
pub use orchestrator::{IndexingError, IndexingOrchestrator, IndexingReport};
pub use reconciliation::{ReconciliationDriver, ReconciliationError, ReconciliationReport};
