//! End-to-end pipeline tests against in-memory stores.
//!
//! These tests drive the reconciliation driver, the indexing
//! orchestrator, and the sync dispatcher through the same trait seams
//! the production adapters implement. No test needs a live Redis,
//! Postgres, search engine, or Docker daemon.

use std::collections::{HashMap, VecDeque};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bigdecimal::BigDecimal;

use offersync::catalog::{CatalogError, CatalogStore, Offer, Stock};
use offersync::config::SyncConfig;
use offersync::indexing::{project, IndexingOrchestrator, ReconciliationDriver};
use offersync::queue::{
    DrainedBatch, EnqueueReason, OfferSnapshot, QueueError, SnapshotError, SnapshotLookup,
    SnapshotStore, VenueProviderRef, WorkKind, WorkQueue,
};
use offersync::search::{OfferDocument, SearchError, SearchIndex};
use offersync::sync::{
    BoundedSyncDispatcher, JobHandle, JobLauncher, JobOutcome, JobSpec, LaunchError, PendingSyncs,
    ProviderKind, SyncTarget, VenueProviderSync,
};
use offersync::utils::externalize;

type Events = Arc<Mutex<Vec<String>>>;

fn record(events: &Events, event: impl Into<String>) {
    events.lock().expect("event log poisoned").push(event.into());
}

fn position(events: &Events, event: &str) -> Option<usize> {
    events
        .lock()
        .expect("event log poisoned")
        .iter()
        .position(|e| e == event)
}

// ----------------------------------------------------------------------------
// In-memory trait implementations
// ----------------------------------------------------------------------------

struct MockQueue {
    lists: Mutex<HashMap<WorkKind, Vec<String>>>,
    events: Events,
}

impl MockQueue {
    fn new(events: Events) -> Self {
        Self {
            lists: Mutex::new(HashMap::new()),
            events,
        }
    }

    fn seed_ids(&self, kind: WorkKind, ids: &[i64]) {
        let mut lists = self.lists.lock().expect("queue lock poisoned");
        let list = lists.entry(kind).or_default();
        list.extend(ids.iter().map(|id| id.to_string()));
    }

    fn seed_venue_provider(&self, item: &VenueProviderRef) {
        let payload = serde_json::to_string(item).expect("pair should serialize");
        self.lists
            .lock()
            .expect("queue lock poisoned")
            .entry(WorkKind::VenueProviders)
            .or_default()
            .push(payload);
    }

    fn read_page(&self, kind: WorkKind, max_items: usize) -> Vec<String> {
        let lists = self.lists.lock().expect("queue lock poisoned");
        lists
            .get(&kind)
            .map(|list| list.iter().take(max_items).cloned().collect())
            .unwrap_or_default()
    }

    fn len(&self, kind: WorkKind) -> usize {
        self.lists
            .lock()
            .expect("queue lock poisoned")
            .get(&kind)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl WorkQueue for MockQueue {
    async fn enqueue_offer_ids(&self, ids: &[i64], _reason: EnqueueReason) {
        self.seed_ids(WorkKind::OfferIds, ids);
    }

    async fn enqueue_venue_ids(&self, ids: &[i64], _reason: EnqueueReason) {
        self.seed_ids(WorkKind::VenueIds, ids);
    }

    async fn enqueue_venue_provider(&self, item: &VenueProviderRef, _reason: EnqueueReason) {
        self.seed_venue_provider(item);
    }

    async fn drain_offer_ids(&self, max_items: usize) -> Result<DrainedBatch<i64>, QueueError> {
        let raw = self.read_page(WorkKind::OfferIds, max_items);
        let raw_len = raw.len();
        let items = raw.iter().filter_map(|v| v.parse().ok()).collect();
        Ok(DrainedBatch { items, raw_len })
    }

    async fn drain_venue_ids(&self, max_items: usize) -> Result<DrainedBatch<i64>, QueueError> {
        let raw = self.read_page(WorkKind::VenueIds, max_items);
        let raw_len = raw.len();
        let items = raw.iter().filter_map(|v| v.parse().ok()).collect();
        Ok(DrainedBatch { items, raw_len })
    }

    async fn drain_venue_providers(
        &self,
        max_items: usize,
    ) -> Result<DrainedBatch<VenueProviderRef>, QueueError> {
        let raw = self.read_page(WorkKind::VenueProviders, max_items);
        let raw_len = raw.len();
        let items = raw
            .iter()
            .filter_map(|v| serde_json::from_str(v).ok())
            .collect();
        Ok(DrainedBatch { items, raw_len })
    }

    async fn clear(&self, kind: WorkKind, count: usize) -> Result<(), QueueError> {
        record(&self.events, format!("clear:{}", kind.list_key()));
        let mut lists = self.lists.lock().expect("queue lock poisoned");
        if let Some(list) = lists.get_mut(&kind) {
            list.drain(..count.min(list.len()));
        }
        Ok(())
    }

    async fn depth(&self, kind: WorkKind) -> Result<usize, QueueError> {
        Ok(self.len(kind))
    }
}

struct MockCatalog {
    offers: HashMap<i64, Offer>,
    by_venue_provider: HashMap<(i64, i64), Vec<i64>>,
    expired: Vec<i64>,
    active_page_calls: AtomicUsize,
    events: Events,
}

impl MockCatalog {
    fn new(offers: Vec<Offer>, events: Events) -> Self {
        Self {
            offers: offers.into_iter().map(|o| (o.id, o)).collect(),
            by_venue_provider: HashMap::new(),
            expired: Vec::new(),
            active_page_calls: AtomicUsize::new(0),
            events,
        }
    }

    fn with_venue_provider_offers(mut self, venue_id: i64, provider_id: i64, ids: Vec<i64>) -> Self {
        self.by_venue_provider.insert((venue_id, provider_id), ids);
        self
    }

    fn with_expired(mut self, ids: Vec<i64>) -> Self {
        self.expired = ids;
        self
    }

    fn sorted_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.offers.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

fn page_slice(ids: &[i64], page: u32, page_size: usize) -> Vec<i64> {
    let start = page as usize * page_size;
    if start >= ids.len() {
        return Vec::new();
    }
    ids[start..(start + page_size).min(ids.len())].to_vec()
}

#[async_trait]
impl CatalogStore for MockCatalog {
    async fn get_offers_by_ids(&self, ids: &[i64]) -> Result<Vec<Offer>, CatalogError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.offers.get(id).cloned())
            .collect())
    }

    async fn get_paginated_offer_ids_by_venue(
        &self,
        venue_id: i64,
        page: u32,
        page_size: usize,
    ) -> Result<Vec<i64>, CatalogError> {
        let mut ids: Vec<i64> = self
            .offers
            .values()
            .filter(|o| o.venue_id == venue_id)
            .map(|o| o.id)
            .collect();
        ids.sort_unstable();
        Ok(page_slice(&ids, page, page_size))
    }

    async fn get_paginated_offer_ids_by_venue_and_last_provider(
        &self,
        venue_id: i64,
        provider_id: i64,
        page: u32,
        page_size: usize,
    ) -> Result<Vec<i64>, CatalogError> {
        record(&self.events, "catalog:venue-provider-read");
        let ids = self
            .by_venue_provider
            .get(&(venue_id, provider_id))
            .cloned()
            .unwrap_or_default();
        Ok(page_slice(&ids, page, page_size))
    }

    async fn get_paginated_active_offer_ids(
        &self,
        page: u32,
        page_size: usize,
    ) -> Result<Vec<i64>, CatalogError> {
        self.active_page_calls.fetch_add(1, Ordering::SeqCst);
        Ok(page_slice(&self.sorted_ids(), page, page_size))
    }

    async fn get_paginated_expired_offer_ids(
        &self,
        page: u32,
        page_size: usize,
    ) -> Result<Vec<i64>, CatalogError> {
        Ok(page_slice(&self.expired, page, page_size))
    }

    async fn deactivate_offers(&self, ids: &[i64]) -> Result<u64, CatalogError> {
        Ok(ids.len() as u64)
    }
}

#[derive(Default)]
struct MockSnapshots {
    entries: Mutex<HashMap<i64, OfferSnapshot>>,
}

impl MockSnapshots {
    fn seed(&self, id: i64, snapshot: OfferSnapshot) {
        self.entries
            .lock()
            .expect("snapshot lock poisoned")
            .insert(id, snapshot);
    }

    fn contains(&self, id: i64) -> bool {
        self.entries
            .lock()
            .expect("snapshot lock poisoned")
            .contains_key(&id)
    }

    fn get(&self, id: i64) -> Option<OfferSnapshot> {
        self.entries
            .lock()
            .expect("snapshot lock poisoned")
            .get(&id)
            .cloned()
    }
}

#[async_trait]
impl SnapshotStore for MockSnapshots {
    async fn get_many(&self, offer_ids: &[i64]) -> Result<Vec<SnapshotLookup>, SnapshotError> {
        let entries = self.entries.lock().expect("snapshot lock poisoned");
        Ok(offer_ids
            .iter()
            .map(|id| match entries.get(id) {
                Some(snapshot) => SnapshotLookup::present(snapshot.clone()),
                None => SnapshotLookup::absent(),
            })
            .collect())
    }

    async fn set_many(&self, entries: &[(i64, OfferSnapshot)]) -> Result<(), SnapshotError> {
        let mut stored = self.entries.lock().expect("snapshot lock poisoned");
        for (id, snapshot) in entries {
            stored.insert(*id, snapshot.clone());
        }
        Ok(())
    }

    async fn delete_many(&self, offer_ids: &[i64]) -> Result<(), SnapshotError> {
        let mut stored = self.entries.lock().expect("snapshot lock poisoned");
        for id in offer_ids {
            stored.remove(id);
        }
        Ok(())
    }

    async fn clear_all(&self) -> Result<(), SnapshotError> {
        self.entries.lock().expect("snapshot lock poisoned").clear();
        Ok(())
    }

    async fn count(&self) -> Result<usize, SnapshotError> {
        Ok(self.entries.lock().expect("snapshot lock poisoned").len())
    }
}

struct MockSearch {
    upserted: Mutex<Vec<String>>,
    deleted: Mutex<Vec<String>>,
    fail_upserts: AtomicBool,
    events: Events,
}

impl MockSearch {
    fn new(events: Events) -> Self {
        Self {
            upserted: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            fail_upserts: AtomicBool::new(false),
            events,
        }
    }

    fn upserted_ids(&self) -> Vec<String> {
        self.upserted.lock().expect("search lock poisoned").clone()
    }

    fn deleted_ids(&self) -> Vec<String> {
        self.deleted.lock().expect("search lock poisoned").clone()
    }
}

#[async_trait]
impl SearchIndex for MockSearch {
    async fn upsert_batch(&self, documents: &[OfferDocument]) -> Result<(), SearchError> {
        if self.fail_upserts.load(Ordering::SeqCst) {
            return Err(SearchError::RequestFailed("simulated outage".to_string()));
        }
        record(&self.events, "search:upsert");
        let mut upserted = self.upserted.lock().expect("search lock poisoned");
        upserted.extend(documents.iter().map(|d| d.object_id.clone()));
        Ok(())
    }

    async fn delete_batch(&self, external_ids: &[String]) -> Result<(), SearchError> {
        record(&self.events, "search:delete");
        let mut deleted = self.deleted.lock().expect("search lock poisoned");
        deleted.extend(external_ids.iter().cloned());
        Ok(())
    }

    async fn clear_all(&self) -> Result<(), SearchError> {
        self.upserted.lock().expect("search lock poisoned").clear();
        self.deleted.lock().expect("search lock poisoned").clear();
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Fixtures
// ----------------------------------------------------------------------------

fn stock(price: &str) -> Stock {
    Stock {
        price: BigDecimal::from_str(price).expect("valid decimal"),
        beginning_datetime: None,
    }
}

fn test_config() -> SyncConfig {
    SyncConfig::new()
        .with_offer_ids_chunk_size(10)
        .with_venue_ids_chunk_size(10)
        .with_offers_by_venue_chunk_size(10)
        .with_deleting_offers_chunk_size(10)
}

struct Pipeline {
    queue: Arc<MockQueue>,
    catalog: Arc<MockCatalog>,
    snapshots: Arc<MockSnapshots>,
    search: Arc<MockSearch>,
    driver: ReconciliationDriver,
    events: Events,
}

fn build_pipeline(catalog: MockCatalog, events: Events) -> Pipeline {
    let queue = Arc::new(MockQueue::new(Arc::clone(&events)));
    let catalog = Arc::new(catalog);
    let snapshots = Arc::new(MockSnapshots::default());
    let search = Arc::new(MockSearch::new(Arc::clone(&events)));

    let orchestrator = IndexingOrchestrator::new(
        Arc::clone(&catalog) as Arc<dyn CatalogStore>,
        Arc::clone(&snapshots) as Arc<dyn SnapshotStore>,
        Arc::clone(&search) as Arc<dyn SearchIndex>,
    );
    let driver = ReconciliationDriver::new(
        Arc::clone(&queue) as Arc<dyn WorkQueue>,
        Arc::clone(&catalog) as Arc<dyn CatalogStore>,
        orchestrator,
        test_config(),
    );

    Pipeline {
        queue,
        catalog,
        snapshots,
        search,
        driver,
        events,
    }
}

// ----------------------------------------------------------------------------
// Queue-driven reconciliation
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_offer_queue_adds_eligible_and_removes_ineligible() {
    let events: Events = Arc::default();
    let offer_a = Offer::new(101, "Fresh concert", 1)
        .with_eligibility(true)
        .with_stocks(vec![stock("10.50")]);
    let offer_b = Offer::new(102, "Withdrawn book", 1)
        .with_eligibility(false)
        .with_stocks(vec![stock("7.00")]);

    let pipeline = build_pipeline(
        MockCatalog::new(vec![offer_a.clone(), offer_b], Arc::clone(&events)),
        events,
    );
    pipeline
        .snapshots
        .seed(102, project(&Offer::new(102, "Withdrawn book", 1)));
    pipeline.queue.seed_ids(WorkKind::OfferIds, &[101, 102]);

    let report = pipeline
        .driver
        .index_offers_from_queue(false)
        .await
        .expect("cycle should succeed");

    assert_eq!(report.added, 1, "Offer A should be added");
    assert_eq!(report.removed, 1, "Offer B should be removed");
    assert_eq!(
        pipeline.search.upserted_ids(),
        vec![externalize(101)],
        "Only A should be upserted, under its external id"
    );
    assert_eq!(
        pipeline.search.deleted_ids(),
        vec![externalize(102)],
        "B should be deleted under its external id"
    );
    assert!(
        pipeline.snapshots.contains(101),
        "Snapshots should gain offer A"
    );
    assert!(
        !pipeline.snapshots.contains(102),
        "Snapshots should lose offer B"
    );
    assert_eq!(
        pipeline.queue.len(WorkKind::OfferIds),
        0,
        "Processed range should be cleared from the queue"
    );

    // The queue range is cleared only after the index writes landed.
    let upsert_at = position(&pipeline.events, "search:upsert").expect("upsert should happen");
    let clear_at = position(&pipeline.events, "clear:offer_ids").expect("clear should happen");
    assert!(
        upsert_at < clear_at,
        "Queue must be cleared after the batch succeeds"
    );
}

#[tokio::test]
async fn test_snapshot_round_trip_after_add() {
    let events: Events = Arc::default();
    let offer = Offer::new(110, "Reissued vinyl", 3)
        .with_eligibility(true)
        .with_stocks(vec![stock("10.00"), stock("12.50")]);

    let pipeline = build_pipeline(
        MockCatalog::new(vec![offer.clone()], Arc::clone(&events)),
        events,
    );
    pipeline.queue.seed_ids(WorkKind::OfferIds, &[110]);

    pipeline
        .driver
        .index_offers_from_queue(false)
        .await
        .expect("cycle should succeed");

    let stored = pipeline
        .snapshots
        .get(110)
        .expect("snapshot should be stored after add");
    assert_eq!(
        stored,
        project(&offer),
        "Stored snapshot must equal the offer's projection"
    );

    // Value equality, not textual: 10.0 and 10.00 are the same price.
    let equivalent = OfferSnapshot {
        name: stored.name.clone(),
        dates: stored.dates.clone(),
        prices: vec![
            BigDecimal::from_str("10.0").expect("valid decimal"),
            BigDecimal::from_str("12.5").expect("valid decimal"),
        ],
    };
    assert_eq!(stored, equivalent, "Price comparison must be numeric");
}

#[tokio::test]
async fn test_provider_triggered_second_pass_skips_unchanged() {
    let events: Events = Arc::default();
    let offer = Offer::new(201, "Synced showtime", 4)
        .with_event(false)
        .with_eligibility(true)
        .with_stocks(vec![stock("9.90")]);

    let catalog = Arc::new(MockCatalog::new(vec![offer], Arc::clone(&events)));
    let snapshots = Arc::new(MockSnapshots::default());
    let search = Arc::new(MockSearch::new(Arc::clone(&events)));

    let orchestrator = IndexingOrchestrator::new(
        Arc::clone(&catalog) as Arc<dyn CatalogStore>,
        Arc::clone(&snapshots) as Arc<dyn SnapshotStore>,
        Arc::clone(&search) as Arc<dyn SearchIndex>,
    );

    let first = orchestrator
        .process_eligible_offers(&[201], true)
        .await
        .expect("first pass should succeed");
    assert_eq!(first.added, 1, "First provider pass should add the offer");

    let second = orchestrator
        .process_eligible_offers(&[201], true)
        .await
        .expect("second pass should succeed");
    assert_eq!(second.skipped, 1, "Unchanged offer should be skipped");
    assert_eq!(second.added + second.updated, 0, "No second write");
    assert_eq!(
        search.upserted_ids().len(),
        1,
        "The index should see exactly one upsert across both passes"
    );
}

// ----------------------------------------------------------------------------
// Clearing boundaries
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_venue_provider_queue_cleared_before_first_catalog_read() {
    let events: Events = Arc::default();
    let offer = Offer::new(301, "Provider import", 9)
        .with_eligibility(true)
        .with_stocks(vec![stock("15.00")]);

    let catalog = MockCatalog::new(vec![offer], Arc::clone(&events))
        .with_venue_provider_offers(9, 5, vec![301]);
    let pipeline = build_pipeline(catalog, events);
    pipeline.queue.seed_venue_provider(&VenueProviderRef {
        provider_id: 5,
        venue_id: 9,
    });

    let report = pipeline
        .driver
        .index_venue_providers_from_queue()
        .await
        .expect("cycle should succeed");

    assert_eq!(report.added, 1, "The provider's offer should be indexed");
    assert_eq!(
        pipeline.queue.len(WorkKind::VenueProviders),
        0,
        "Queue should be empty after the cycle"
    );

    let clear_at = position(&pipeline.events, "clear:venue_providers")
        .expect("venue-provider queue should be cleared");
    let read_at = position(&pipeline.events, "catalog:venue-provider-read")
        .expect("catalog should be read");
    assert!(
        clear_at < read_at,
        "Entries must leave the queue before the first catalog read"
    );
}

#[tokio::test]
async fn test_venue_queue_kept_on_failure_and_cleared_on_retry() {
    let events: Events = Arc::default();
    let offer = Offer::new(401, "Venue refresh", 9)
        .with_eligibility(true)
        .with_stocks(vec![stock("20.00")]);

    let pipeline = build_pipeline(MockCatalog::new(vec![offer], Arc::clone(&events)), events);
    pipeline.queue.seed_ids(WorkKind::VenueIds, &[9]);
    pipeline.search.fail_upserts.store(true, Ordering::SeqCst);

    let result = pipeline.driver.index_venues_from_queue().await;
    assert!(result.is_err(), "Cycle should fail while the index is down");
    assert_eq!(
        pipeline.queue.len(WorkKind::VenueIds),
        1,
        "Failed venue batch must stay queued for the next cycle"
    );

    pipeline.search.fail_upserts.store(false, Ordering::SeqCst);
    let report = pipeline
        .driver
        .index_venues_from_queue()
        .await
        .expect("retry should succeed");
    assert_eq!(report.added, 1, "Retry should index the venue's offer");
    assert_eq!(
        pipeline.queue.len(WorkKind::VenueIds),
        0,
        "Queue should be cleared once the whole batch succeeded"
    );
}

// ----------------------------------------------------------------------------
// Catalog walks
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_full_reindex_stops_after_one_empty_page() {
    let events: Events = Arc::default();
    let offers: Vec<Offer> = (1..=25)
        .map(|id| {
            Offer::new(id, format!("Offer {}", id), 1)
                .with_eligibility(true)
                .with_stocks(vec![stock("5.00")])
        })
        .collect();

    let pipeline = build_pipeline(MockCatalog::new(offers, Arc::clone(&events)), events);

    let report = pipeline
        .driver
        .index_all_offers()
        .await
        .expect("full reindex should succeed");

    assert_eq!(report.added, 25, "Every active offer should be indexed");
    assert_eq!(report.pages, 3, "25 offers at page size 10 is 3 pages");
    // ceil(25 / 10) + 1: three data pages plus the empty page that
    // terminates the loop.
    assert_eq!(
        pipeline.catalog.active_page_calls.load(Ordering::SeqCst),
        4,
        "The loop must stop on the first empty page"
    );
}

#[tokio::test]
async fn test_expired_purge_removes_only_indexed_offers() {
    let events: Events = Arc::default();
    let catalog =
        MockCatalog::new(Vec::new(), Arc::clone(&events)).with_expired(vec![501, 502]);
    let pipeline = build_pipeline(catalog, events);
    pipeline.snapshots.seed(
        501,
        OfferSnapshot {
            name: "Stale event".to_string(),
            dates: vec![1_700_000_000],
            prices: vec![BigDecimal::from_str("8.00").expect("valid decimal")],
        },
    );

    let report = pipeline
        .driver
        .purge_expired_offers()
        .await
        .expect("purge should succeed");

    assert_eq!(report.removed, 1, "Only the indexed expired offer counts");
    assert_eq!(
        pipeline.search.deleted_ids(),
        vec![externalize(501)],
        "Only the indexed offer should reach the delete call"
    );
    assert!(
        !pipeline.snapshots.contains(501),
        "The snapshot should be dropped with the document"
    );
}

// ----------------------------------------------------------------------------
// Sync dispatch
// ----------------------------------------------------------------------------

struct QueuePending<T> {
    items: Mutex<VecDeque<T>>,
}

impl<T> QueuePending<T> {
    fn with_items(items: Vec<T>) -> Self {
        Self {
            items: Mutex::new(items.into()),
        }
    }
}

#[async_trait]
impl<T: SyncTarget> PendingSyncs<T> for QueuePending<T> {
    async fn push(&self, target: &T) -> Result<(), QueueError> {
        self.items
            .lock()
            .expect("pending lock poisoned")
            .push_back(target.clone());
        Ok(())
    }

    async fn pop_head(&self) -> Result<Option<T>, QueueError> {
        Ok(self.items.lock().expect("pending lock poisoned").pop_front())
    }

    async fn depth(&self) -> Result<usize, QueueError> {
        Ok(self.items.lock().expect("pending lock poisoned").len())
    }
}

struct TrackingLauncher {
    running: AtomicUsize,
    peak: AtomicUsize,
    fail_launches: bool,
}

impl TrackingLauncher {
    fn new(fail_launches: bool) -> Self {
        Self {
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            fail_launches,
        }
    }
}

#[async_trait]
impl JobLauncher for TrackingLauncher {
    async fn launch(&self, spec: &JobSpec) -> Result<JobHandle, LaunchError> {
        if self.fail_launches {
            return Err(LaunchError::LaunchFailed {
                name: spec.name.clone(),
                message: "daemon refused".to_string(),
            });
        }
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        Ok(JobHandle {
            container_id: format!("c-{}", spec.name),
            name: spec.name.clone(),
        })
    }

    async fn wait(&self, _handle: JobHandle) -> Result<JobOutcome, LaunchError> {
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.running.fetch_sub(1, Ordering::SeqCst);
        Ok(JobOutcome { exit_code: 0 })
    }
}

fn sync_targets(count: i64) -> Vec<VenueProviderSync> {
    (1..=count)
        .map(|venue_id| VenueProviderSync {
            provider: ProviderKind::Generic,
            provider_id: 1,
            venue_id,
        })
        .collect()
}

fn dispatcher_config(pool_size: usize) -> SyncConfig {
    SyncConfig::new()
        .with_provider_sync_pool_size(pool_size)
        .with_provider_sync_wait_interval(Duration::from_millis(5))
        .with_provider_sync_image("sync-worker:test")
}

#[tokio::test]
async fn test_dispatcher_launches_all_within_pool_bound() {
    let pending = Arc::new(QueuePending::with_items(sync_targets(5)));
    let launcher = Arc::new(TrackingLauncher::new(false));
    let dispatcher = BoundedSyncDispatcher::new(
        Arc::clone(&pending) as Arc<dyn PendingSyncs<VenueProviderSync>>,
        Arc::clone(&launcher) as Arc<dyn JobLauncher>,
        dispatcher_config(2),
    );

    let report = dispatcher.run_cycle().await.expect("cycle should succeed");

    assert_eq!(report.launched, 5, "Every pending target should launch");
    assert!(
        launcher.peak.load(Ordering::SeqCst) <= 2,
        "Concurrent jobs must never exceed the pool size"
    );

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(
        dispatcher.in_flight_count().await,
        0,
        "All markers should clear once the jobs finish"
    );
}

#[tokio::test]
async fn test_dispatcher_launch_failure_clears_markers() {
    let pending = Arc::new(QueuePending::with_items(sync_targets(3)));
    let dispatcher = BoundedSyncDispatcher::new(
        Arc::clone(&pending) as Arc<dyn PendingSyncs<VenueProviderSync>>,
        Arc::new(TrackingLauncher::new(true)) as Arc<dyn JobLauncher>,
        dispatcher_config(2),
    );

    let report = dispatcher.run_cycle().await.expect("cycle should succeed");

    assert_eq!(report.launched, 0, "No job should launch");
    assert_eq!(report.failed, 3, "Every target should be dropped");
    assert_eq!(
        dispatcher.in_flight_count().await,
        0,
        "Failed launches must not leave markers behind"
    );
    assert_eq!(
        pending.depth().await.expect("depth should be readable"),
        0,
        "Dropped targets are not requeued"
    );
}
