//! Core indexing pass over batches of offer ids.
//!
//! The orchestrator ties the catalog, the snapshot store, and the
//! search engine together: it fetches offers in bulk, runs the reindex
//! decision for each one, then applies the resulting upserts and
//! deletes. Snapshot writes happen only after the corresponding index
//! write succeeded, so a failed batch leaves the stored state untouched
//! and the same ids are picked up again on the next cycle.

use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;

use crate::catalog::{CatalogError, CatalogStore};
use crate::metrics::MetricsCollector;
use crate::queue::{OfferSnapshot, SnapshotError, SnapshotStore};
use crate::search::{OfferDocument, SearchError, SearchIndex};
use crate::utils::externalize;

use super::eligibility::{self, Decision};

/// Errors that can occur during an indexing pass.
#[derive(Debug, Error)]
pub enum IndexingError {
    /// Reading offers from the catalog failed.
    #[error("Catalog read failed: {0}")]
    Catalog(#[from] CatalogError),

    /// Reading or writing offer snapshots failed.
    #[error("Snapshot store access failed: {0}")]
    Snapshot(#[from] SnapshotError),

    /// Writing to the search engine failed.
    #[error("Search index write failed: {0}")]
    Search(#[from] SearchError),
}

/// Counts of what one indexing pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexingReport {
    /// Offers added to the index for the first time.
    pub added: usize,
    /// Offers whose indexed document was refreshed.
    pub updated: usize,
    /// Offers removed from the index.
    pub removed: usize,
    /// Offers left untouched.
    pub skipped: usize,
}

impl IndexingReport {
    /// Total number of documents written to the index.
    pub fn upserted(&self) -> usize {
        self.added + self.updated
    }
}

/// Coordinates eligibility evaluation, index writes, and snapshot upkeep.
pub struct IndexingOrchestrator {
    catalog: Arc<dyn CatalogStore>,
    snapshots: Arc<dyn SnapshotStore>,
    search: Arc<dyn SearchIndex>,
    metrics: MetricsCollector,
}

impl IndexingOrchestrator {
    /// Creates a new orchestrator over the given collaborators.
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        snapshots: Arc<dyn SnapshotStore>,
        search: Arc<dyn SearchIndex>,
    ) -> Self {
        Self {
            catalog,
            snapshots,
            search,
            metrics: MetricsCollector::new(),
        }
    }

    /// Reindexes or unindexes each of the given offers.
    ///
    /// Offers absent from the catalog are ignored; deactivation flows
    /// through the eligibility predicate, not through row deletion.
    /// Returns the counts of applied operations. On a search engine
    /// failure the error propagates so the caller keeps its queue
    /// entries and retries the same ids on the next cycle.
    pub async fn process_eligible_offers(
        &self,
        offer_ids: &[i64],
        is_provider_triggered: bool,
    ) -> Result<IndexingReport, IndexingError> {
        if offer_ids.is_empty() {
            return Ok(IndexingReport::default());
        }
        let started = Instant::now();

        let offers = self.catalog.get_offers_by_ids(offer_ids).await?;
        let found_ids: Vec<i64> = offers.iter().map(|offer| offer.id).collect();
        let lookups = self.snapshots.get_many(&found_ids).await?;

        let mut report = IndexingReport::default();
        let mut documents: Vec<OfferDocument> = Vec::new();
        let mut snapshot_entries: Vec<(i64, OfferSnapshot)> = Vec::new();
        let mut to_remove: Vec<i64> = Vec::new();

        for (offer, lookup) in offers.iter().zip(lookups.iter()) {
            let decision = eligibility::evaluate(
                offer,
                lookup.existed,
                lookup.snapshot.as_ref(),
                is_provider_triggered,
            );

            match decision {
                Decision::Add | Decision::Update => {
                    let projection = eligibility::project(offer);
                    documents.push(OfferDocument::build(offer, &projection));
                    snapshot_entries.push((offer.id, projection));
                    if decision == Decision::Add {
                        report.added += 1;
                    } else {
                        report.updated += 1;
                    }
                }
                Decision::Remove => {
                    to_remove.push(offer.id);
                    report.removed += 1;
                }
                Decision::Skip => {
                    report.skipped += 1;
                }
            }
        }

        if !documents.is_empty() {
            if let Err(err) = self.search.upsert_batch(&documents).await {
                tracing::error!(
                    count = documents.len(),
                    error = %err,
                    "Search index upsert failed, batch aborted"
                );
                self.metrics.record_search_request("upsert", false);
                return Err(err.into());
            }
            self.metrics.record_search_request("upsert", true);

            // Snapshots record what the index now contains; a failure
            // here propagates so the batch is replayed rather than
            // silently drifting out of step.
            self.snapshots.set_many(&snapshot_entries).await?;
        }

        if !to_remove.is_empty() {
            let external_ids: Vec<String> = to_remove.iter().map(|id| externalize(*id)).collect();
            if let Err(err) = self.search.delete_batch(&external_ids).await {
                tracing::error!(
                    count = external_ids.len(),
                    error = %err,
                    "Search index delete failed, batch aborted"
                );
                self.metrics.record_search_request("delete", false);
                return Err(err.into());
            }
            self.metrics.record_search_request("delete", true);

            self.snapshots.delete_many(&to_remove).await?;
        }

        self.metrics.record_indexed("add", report.added);
        self.metrics.record_indexed("update", report.updated);
        self.metrics.record_indexed("remove", report.removed);
        self.metrics.record_indexed("skip", report.skipped);
        self.metrics
            .record_batch_duration(started.elapsed().as_secs_f64());

        tracing::info!(
            requested = offer_ids.len(),
            added = report.added,
            updated = report.updated,
            removed = report.removed,
            skipped = report.skipped,
            provider_triggered = is_provider_triggered,
            "Processed indexing batch"
        );

        Ok(report)
    }

    /// Removes expired offers from the index.
    ///
    /// Expiry is decided upstream by the catalog query, so there is no
    /// eligibility evaluation here: every id that currently has a
    /// snapshot is deleted from the index. Returns the number of
    /// removed documents.
    pub async fn delete_expired_offers(&self, offer_ids: &[i64]) -> Result<usize, IndexingError> {
        if offer_ids.is_empty() {
            return Ok(0);
        }

        let lookups = self.snapshots.get_many(offer_ids).await?;
        let indexed: Vec<i64> = offer_ids
            .iter()
            .zip(lookups.iter())
            .filter(|(_, lookup)| lookup.existed)
            .map(|(id, _)| *id)
            .collect();

        if indexed.is_empty() {
            return Ok(0);
        }

        let external_ids: Vec<String> = indexed.iter().map(|id| externalize(*id)).collect();
        if let Err(err) = self.search.delete_batch(&external_ids).await {
            tracing::error!(
                count = external_ids.len(),
                error = %err,
                "Expired offer removal failed, batch aborted"
            );
            self.metrics.record_search_request("delete", false);
            return Err(err.into());
        }
        self.metrics.record_search_request("delete", true);

        self.snapshots.delete_many(&indexed).await?;
        self.metrics.record_indexed("remove", indexed.len());

        tracing::info!(
            requested = offer_ids.len(),
            removed = indexed.len(),
            "Removed expired offers from index"
        );

        Ok(indexed.len())
    }

    /// Empties the search index and the snapshot store.
    pub async fn clear_index(&self) -> Result<(), IndexingError> {
        self.search.clear_all().await?;
        self.snapshots.clear_all().await?;
        tracing::info!("Cleared search index and snapshot store");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Offer, Stock};
    use crate::queue::SnapshotLookup;
    use async_trait::async_trait;
    use bigdecimal::BigDecimal;
    use std::collections::HashMap;
    use std::str::FromStr;
    use std::sync::Mutex;

    /// Catalog fake serving a fixed set of offers.
    struct StaticCatalog {
        offers: Vec<Offer>,
    }

    #[async_trait]
    impl CatalogStore for StaticCatalog {
        async fn get_offers_by_ids(&self, ids: &[i64]) -> Result<Vec<Offer>, CatalogError> {
            Ok(self
                .offers
                .iter()
                .filter(|offer| ids.contains(&offer.id))
                .cloned()
                .collect())
        }

        async fn get_paginated_offer_ids_by_venue(
            &self,
            _venue_id: i64,
            _page: u32,
            _page_size: usize,
        ) -> Result<Vec<i64>, CatalogError> {
            Ok(Vec::new())
        }

        async fn get_paginated_offer_ids_by_venue_and_last_provider(
            &self,
            _venue_id: i64,
            _provider_id: i64,
            _page: u32,
            _page_size: usize,
        ) -> Result<Vec<i64>, CatalogError> {
            Ok(Vec::new())
        }

        async fn get_paginated_active_offer_ids(
            &self,
            _page: u32,
            _page_size: usize,
        ) -> Result<Vec<i64>, CatalogError> {
            Ok(Vec::new())
        }

        async fn get_paginated_expired_offer_ids(
            &self,
            _page: u32,
            _page_size: usize,
        ) -> Result<Vec<i64>, CatalogError> {
            Ok(Vec::new())
        }

        async fn deactivate_offers(&self, _ids: &[i64]) -> Result<u64, CatalogError> {
            Ok(0)
        }
    }

    /// Snapshot store fake backed by a hash map.
    #[derive(Default)]
    struct InMemorySnapshots {
        entries: Mutex<HashMap<i64, OfferSnapshot>>,
    }

    #[async_trait]
    impl SnapshotStore for InMemorySnapshots {
        async fn get_many(&self, offer_ids: &[i64]) -> Result<Vec<SnapshotLookup>, SnapshotError> {
            let entries = self.entries.lock().unwrap();
            Ok(offer_ids
                .iter()
                .map(|id| match entries.get(id) {
                    Some(snapshot) => SnapshotLookup::present(snapshot.clone()),
                    None => SnapshotLookup::absent(),
                })
                .collect())
        }

        async fn set_many(&self, entries: &[(i64, OfferSnapshot)]) -> Result<(), SnapshotError> {
            let mut stored = self.entries.lock().unwrap();
            for (id, snapshot) in entries {
                stored.insert(*id, snapshot.clone());
            }
            Ok(())
        }

        async fn delete_many(&self, offer_ids: &[i64]) -> Result<(), SnapshotError> {
            let mut stored = self.entries.lock().unwrap();
            for id in offer_ids {
                stored.remove(id);
            }
            Ok(())
        }

        async fn clear_all(&self) -> Result<(), SnapshotError> {
            self.entries.lock().unwrap().clear();
            Ok(())
        }

        async fn count(&self) -> Result<usize, SnapshotError> {
            Ok(self.entries.lock().unwrap().len())
        }
    }

    /// Search index fake recording every write it receives.
    #[derive(Default)]
    struct RecordingIndex {
        upserts: Mutex<Vec<Vec<String>>>,
        deletes: Mutex<Vec<Vec<String>>>,
        fail_upserts: bool,
    }

    #[async_trait]
    impl SearchIndex for RecordingIndex {
        async fn upsert_batch(&self, documents: &[OfferDocument]) -> Result<(), SearchError> {
            if self.fail_upserts {
                return Err(SearchError::RequestFailed("connection reset".to_string()));
            }
            self.upserts.lock().unwrap().push(
                documents
                    .iter()
                    .map(|doc| doc.object_id.clone())
                    .collect(),
            );
            Ok(())
        }

        async fn delete_batch(&self, external_ids: &[String]) -> Result<(), SearchError> {
            self.deletes.lock().unwrap().push(external_ids.to_vec());
            Ok(())
        }

        async fn clear_all(&self) -> Result<(), SearchError> {
            Ok(())
        }
    }

    fn stock(price: &str) -> Stock {
        Stock {
            price: BigDecimal::from_str(price).unwrap(),
            beginning_datetime: None,
        }
    }

    fn orchestrator_with(
        offers: Vec<Offer>,
        snapshots: Arc<InMemorySnapshots>,
        index: Arc<RecordingIndex>,
    ) -> IndexingOrchestrator {
        IndexingOrchestrator::new(Arc::new(StaticCatalog { offers }), snapshots, index)
    }

    #[tokio::test]
    async fn test_add_and_remove_in_one_batch() {
        let eligible = Offer::new(1, "New offer", 10)
            .with_eligibility(true)
            .with_stocks(vec![stock("12.00")]);
        let ineligible = Offer::new(2, "Gone offer", 10).with_eligibility(false);

        let snapshots = Arc::new(InMemorySnapshots::default());
        snapshots
            .set_many(&[(2, eligibility::project(&ineligible))])
            .await
            .unwrap();
        let index = Arc::new(RecordingIndex::default());

        let orchestrator =
            orchestrator_with(vec![eligible, ineligible], snapshots.clone(), index.clone());
        let report = orchestrator
            .process_eligible_offers(&[1, 2], false)
            .await
            .unwrap();

        assert_eq!(report.added, 1);
        assert_eq!(report.removed, 1);
        assert_eq!(report.skipped, 0);

        let upserts = index.upserts.lock().unwrap();
        assert_eq!(upserts.len(), 1);
        assert_eq!(upserts[0], vec![externalize(1)]);

        let deletes = index.deletes.lock().unwrap();
        assert_eq!(deletes.len(), 1);
        assert_eq!(deletes[0], vec![externalize(2)]);

        // Snapshot store gains the added offer and loses the removed one.
        let lookups = snapshots.get_many(&[1, 2]).await.unwrap();
        assert!(lookups[0].existed);
        assert!(!lookups[1].existed);
    }

    #[tokio::test]
    async fn test_provider_triggered_second_pass_skips() {
        let offer = Offer::new(5, "Stable offer", 10)
            .with_eligibility(true)
            .with_stocks(vec![stock("20.00")]);

        let snapshots = Arc::new(InMemorySnapshots::default());
        let index = Arc::new(RecordingIndex::default());
        let orchestrator = orchestrator_with(vec![offer], snapshots, index.clone());

        let first = orchestrator
            .process_eligible_offers(&[5], true)
            .await
            .unwrap();
        assert_eq!(first.added, 1);

        let second = orchestrator
            .process_eligible_offers(&[5], true)
            .await
            .unwrap();
        assert_eq!(second.skipped, 1);
        assert_eq!(second.upserted(), 0);

        // Exactly one upsert across both passes.
        assert_eq!(index.upserts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_failure_keeps_snapshots_untouched() {
        let offer = Offer::new(9, "Offer", 10)
            .with_eligibility(true)
            .with_stocks(vec![stock("5.00")]);

        let snapshots = Arc::new(InMemorySnapshots::default());
        let index = Arc::new(RecordingIndex {
            fail_upserts: true,
            ..Default::default()
        });
        let orchestrator = orchestrator_with(vec![offer], snapshots.clone(), index);

        let result = orchestrator.process_eligible_offers(&[9], false).await;
        assert!(matches!(result, Err(IndexingError::Search(_))));
        assert_eq!(snapshots.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_expired_removal_only_touches_indexed_ids() {
        let snapshots = Arc::new(InMemorySnapshots::default());
        snapshots
            .set_many(&[(
                3,
                OfferSnapshot {
                    name: "Expired".to_string(),
                    dates: vec![],
                    prices: vec![],
                },
            )])
            .await
            .unwrap();
        let index = Arc::new(RecordingIndex::default());

        let orchestrator = orchestrator_with(Vec::new(), snapshots.clone(), index.clone());
        let removed = orchestrator.delete_expired_offers(&[3, 4]).await.unwrap();

        assert_eq!(removed, 1);
        let deletes = index.deletes.lock().unwrap();
        assert_eq!(deletes[0], vec![externalize(3)]);
        assert_eq!(snapshots.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_batch_is_a_no_op() {
        let snapshots = Arc::new(InMemorySnapshots::default());
        let index = Arc::new(RecordingIndex::default());
        let orchestrator = orchestrator_with(Vec::new(), snapshots, index.clone());

        let report = orchestrator.process_eligible_offers(&[], false).await.unwrap();
        assert_eq!(report, IndexingReport::default());
        assert!(index.upserts.lock().unwrap().is_empty());

        assert_eq!(orchestrator.delete_expired_offers(&[]).await.unwrap(), 0);
    }
}
