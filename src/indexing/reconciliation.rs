//! Queue draining and catalog walking.
//!
//! Each public method runs one reconciliation cycle for one mode. The
//! clearing boundary differs per queue kind and is load-bearing:
//!
//! - offer ids: cleared after the batch succeeded (at-most-once on
//!   success, failed batches stay queued),
//! - venue ids: cleared once after every drained venue's pages all
//!   succeeded (a crash mid-venue retries the whole drained range),
//! - venue-provider pairs: cleared before processing starts (a crash
//!   drops in-flight progress instead of replaying a full provider
//!   sweep at catalog scale).

use std::sync::Arc;

use thiserror::Error;

use crate::catalog::{CatalogError, CatalogStore};
use crate::config::SyncConfig;
use crate::metrics::MetricsCollector;
use crate::queue::{QueueError, WorkKind, WorkQueue};

use super::orchestrator::{IndexingError, IndexingOrchestrator, IndexingReport};

/// Errors that can occur during a reconciliation cycle.
#[derive(Debug, Error)]
pub enum ReconciliationError {
    /// Draining or clearing the work queue failed.
    #[error("Work queue access failed: {0}")]
    Queue(#[from] QueueError),

    /// A paginated catalog read failed.
    #[error("Catalog read failed: {0}")]
    Catalog(#[from] CatalogError),

    /// An indexing batch failed.
    #[error("Indexing failed: {0}")]
    Indexing(#[from] IndexingError),
}

/// Counts of what one reconciliation cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconciliationReport {
    /// Pages fed to the orchestrator.
    pub pages: usize,
    /// Offers added to the index.
    pub added: usize,
    /// Offers whose document was refreshed.
    pub updated: usize,
    /// Offers removed from the index.
    pub removed: usize,
    /// Offers left untouched.
    pub skipped: usize,
}

impl ReconciliationReport {
    /// Total number of offers the cycle looked at.
    pub fn touched(&self) -> usize {
        self.added + self.updated + self.removed + self.skipped
    }

    fn absorb(&mut self, report: IndexingReport) {
        self.pages += 1;
        self.added += report.added;
        self.updated += report.updated;
        self.removed += report.removed;
        self.skipped += report.skipped;
    }
}

/// Drives the queue-driven and catalog-walking reconciliation modes.
pub struct ReconciliationDriver {
    queue: Arc<dyn WorkQueue>,
    catalog: Arc<dyn CatalogStore>,
    orchestrator: IndexingOrchestrator,
    config: SyncConfig,
    metrics: MetricsCollector,
}

impl ReconciliationDriver {
    /// Creates a driver over the given collaborators.
    pub fn new(
        queue: Arc<dyn WorkQueue>,
        catalog: Arc<dyn CatalogStore>,
        orchestrator: IndexingOrchestrator,
        config: SyncConfig,
    ) -> Self {
        Self {
            queue,
            catalog,
            orchestrator,
            config,
            metrics: MetricsCollector::new(),
        }
    }

    /// Drains the offer-id queue and reindexes the drained offers.
    ///
    /// When `stop_only_when_empty` is false (the periodic mode), the
    /// loop stops once a drained range comes back shorter than the
    /// chunk size, so a busy queue cannot pin the cycle forever. When
    /// true (manual runs), it keeps draining until the queue is empty.
    pub async fn index_offers_from_queue(
        &self,
        stop_only_when_empty: bool,
    ) -> Result<ReconciliationReport, ReconciliationError> {
        let chunk_size = self.config.offer_ids_chunk_size;
        let mut report = ReconciliationReport::default();

        loop {
            let batch = self.queue.drain_offer_ids(chunk_size).await?;
            if batch.is_empty() {
                break;
            }

            if batch.items.is_empty() {
                // Malformed leftovers only; trim them so they stop
                // resurfacing, without counting a page.
                self.queue.clear(WorkKind::OfferIds, batch.raw_len).await?;
            } else {
                tracing::info!(
                    count = batch.items.len(),
                    "Fetched offer ids from indexation queue"
                );

                let indexed = self
                    .orchestrator
                    .process_eligible_offers(&batch.items, false)
                    .await?;
                report.absorb(indexed);
                self.metrics.record_page("offers");

                self.queue.clear(WorkKind::OfferIds, batch.raw_len).await?;
            }

            if !stop_only_when_empty && batch.raw_len < chunk_size {
                break;
            }
        }

        self.record_queue_depth(WorkKind::OfferIds).await;
        tracing::info!(
            pages = report.pages,
            touched = report.touched(),
            "Finished offer queue reconciliation"
        );
        Ok(report)
    }

    /// Drains the venue-id queue and reindexes every offer of each venue.
    pub async fn index_venues_from_queue(&self) -> Result<ReconciliationReport, ReconciliationError> {
        let batch = self
            .queue
            .drain_venue_ids(self.config.venue_ids_chunk_size)
            .await?;
        if batch.items.is_empty() {
            // Trim malformed leftovers so they stop resurfacing.
            if batch.raw_len > 0 {
                self.queue.clear(WorkKind::VenueIds, batch.raw_len).await?;
            }
            return Ok(ReconciliationReport::default());
        }

        tracing::info!(
            count = batch.items.len(),
            "Fetched venue ids from indexation queue"
        );

        let mut report = ReconciliationReport::default();
        for venue_id in &batch.items {
            tracing::info!(venue_id, "Starting to index offers of venue");
            self.index_offers_of_venue(*venue_id, &mut report).await?;
            tracing::info!(venue_id, "Finished indexing offers of venue");
        }

        self.queue.clear(WorkKind::VenueIds, batch.raw_len).await?;
        self.record_queue_depth(WorkKind::VenueIds).await;

        tracing::info!(
            venues = batch.items.len(),
            pages = report.pages,
            touched = report.touched(),
            "Finished venue queue reconciliation"
        );
        Ok(report)
    }

    /// Drains the venue-provider queue and reindexes each pair's offers.
    ///
    /// The drained range is cleared up front, so these entries are gone
    /// before the first catalog read of the cycle.
    pub async fn index_venue_providers_from_queue(
        &self,
    ) -> Result<ReconciliationReport, ReconciliationError> {
        let batch = self
            .queue
            .drain_venue_providers(self.config.venue_ids_chunk_size)
            .await?;
        if batch.raw_len > 0 {
            self.queue
                .clear(WorkKind::VenueProviders, batch.raw_len)
                .await?;
        }
        if batch.items.is_empty() {
            return Ok(ReconciliationReport::default());
        }

        tracing::info!(
            count = batch.items.len(),
            "Fetched venue-provider pairs from indexation queue"
        );

        let page_size = self.config.offers_by_venue_chunk_size;
        let mut report = ReconciliationReport::default();
        for pair in &batch.items {
            tracing::info!(
                venue_id = pair.venue_id,
                provider_id = pair.provider_id,
                "Starting to index offers of venue provider"
            );
            let mut page: u32 = 0;
            loop {
                let ids = self
                    .catalog
                    .get_paginated_offer_ids_by_venue_and_last_provider(
                        pair.venue_id,
                        pair.provider_id,
                        page,
                        page_size,
                    )
                    .await?;
                if ids.is_empty() {
                    break;
                }
                let indexed = self.orchestrator.process_eligible_offers(&ids, true).await?;
                report.absorb(indexed);
                self.metrics.record_page("venue_provider");
                page += 1;
            }
        }

        self.record_queue_depth(WorkKind::VenueProviders).await;
        tracing::info!(
            pairs = batch.items.len(),
            pages = report.pages,
            touched = report.touched(),
            "Finished venue-provider queue reconciliation"
        );
        Ok(report)
    }

    /// Walks every active offer in the catalog and reindexes it.
    pub async fn index_all_offers(&self) -> Result<ReconciliationReport, ReconciliationError> {
        tracing::info!("Starting full catalog reindex");

        let page_size = self.config.offers_by_venue_chunk_size;
        let mut report = ReconciliationReport::default();
        let mut page: u32 = 0;
        loop {
            let ids = self
                .catalog
                .get_paginated_active_offer_ids(page, page_size)
                .await?;
            if ids.is_empty() {
                break;
            }
            let indexed = self.orchestrator.process_eligible_offers(&ids, false).await?;
            report.absorb(indexed);
            self.metrics.record_page("full");
            page += 1;
        }

        tracing::info!(
            pages = report.pages,
            touched = report.touched(),
            "Finished full catalog reindex"
        );
        Ok(report)
    }

    /// Walks expired offers and removes them from the index.
    ///
    /// Removal does not change whether an offer matches the expired
    /// predicate, so offset pagination stays stable while deleting.
    pub async fn purge_expired_offers(&self) -> Result<ReconciliationReport, ReconciliationError> {
        tracing::info!("Starting expired offer purge");

        let page_size = self.config.deleting_offers_chunk_size;
        let mut report = ReconciliationReport::default();
        let mut page: u32 = 0;
        loop {
            let ids = self
                .catalog
                .get_paginated_expired_offer_ids(page, page_size)
                .await?;
            if ids.is_empty() {
                break;
            }
            let removed = self.orchestrator.delete_expired_offers(&ids).await?;
            report.absorb(IndexingReport {
                removed,
                ..IndexingReport::default()
            });
            self.metrics.record_page("expired");
            page += 1;
        }

        tracing::info!(
            pages = report.pages,
            removed = report.removed,
            "Finished expired offer purge"
        );
        Ok(report)
    }

    /// Access to the orchestrator for paths that bypass the queues.
    pub fn orchestrator(&self) -> &IndexingOrchestrator {
        &self.orchestrator
    }

    async fn index_offers_of_venue(
        &self,
        venue_id: i64,
        report: &mut ReconciliationReport,
    ) -> Result<(), ReconciliationError> {
        let page_size = self.config.offers_by_venue_chunk_size;
        let mut page: u32 = 0;
        loop {
            let ids = self
                .catalog
                .get_paginated_offer_ids_by_venue(venue_id, page, page_size)
                .await?;
            if ids.is_empty() {
                break;
            }
            let indexed = self.orchestrator.process_eligible_offers(&ids, false).await?;
            report.absorb(indexed);
            self.metrics.record_page("venue");
            page += 1;
        }
        Ok(())
    }

    async fn record_queue_depth(&self, kind: WorkKind) {
        match self.queue.depth(kind).await {
            Ok(depth) => self.metrics.update_queue_depth(kind.list_key(), depth),
            Err(err) => {
                tracing::warn!(kind = %kind, error = %err, "Could not read queue depth")
            }
        }
    }
}
