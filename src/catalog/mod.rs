//! Offer catalog access.
//!
//! This module provides the pipeline's view of the host application's
//! catalog database:
//!
//! - **Offer / Stock**: the fields the pipeline consumes
//! - **CatalogStore**: bulk reads and offset-paginated id scans
//! - **deactivate_offers**: the one combined write path, which flips
//!   offers inactive and queues them for index re-evaluation

use crate::queue::{EnqueueReason, WorkQueue};

pub mod models;
pub mod store;

// Re-export main types for convenience
pub use models::{Offer, Stock};
pub use store::{CatalogError, CatalogStore, PgCatalogStore};

/// Deactivates offers in the catalog and queues them so the next
/// reconciliation cycle removes them from the search index.
///
/// The queue push is best-effort; the catalog update is the source of
/// truth and a missed push only delays the index update until the next
/// full reindex.
pub async fn deactivate_offers(
    catalog: &dyn CatalogStore,
    queue: &dyn WorkQueue,
    offer_ids: &[i64],
) -> Result<u64, CatalogError> {
    let updated = catalog.deactivate_offers(offer_ids).await?;

    tracing::info!(
        count = offer_ids.len(),
        updated,
        "Deactivated offers, queueing them for index removal"
    );

    queue
        .enqueue_offer_ids(offer_ids, EnqueueReason::OfferBatchUpdate)
        .await;

    Ok(updated)
}
