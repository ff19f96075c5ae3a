//! Redis-backed work queues feeding the indexing pipeline.
//!
//! Three FIFO lists hold pending work, one per kind:
//!
//! - `offer_ids`: offers whose index entry must be re-evaluated
//! - `venue_ids`: venues whose whole offer set must be re-evaluated
//! - `venue_providers`: venue/provider pairs touched by a provider sync
//!
//! # Draining Model
//!
//! Consumers read a bounded page from the head of a list without removing
//! it, process the page, then trim exactly that many entries. Items pushed
//! while a page is being processed land after the trimmed range and are
//! picked up by the next cycle. Enqueueing is best-effort: the catalog
//! write has already committed by the time an id is pushed, so a failed
//! push costs a stale search result, not data loss.

use std::fmt;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during queue operations.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Failed to connect to Redis.
    #[error("Redis connection failed: {0}")]
    ConnectionFailed(String),

    /// Redis operation failed.
    #[error("Redis operation failed: {0}")]
    RedisError(#[from] redis::RedisError),

    /// Failed to serialize a queue entry.
    #[error("Serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// The three kinds of pending work the pipeline consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkKind {
    /// Individual offers to re-evaluate.
    OfferIds,
    /// Venues whose whole offer set must be re-evaluated.
    VenueIds,
    /// Venue/provider pairs touched by a provider synchronization.
    VenueProviders,
}

impl WorkKind {
    /// Redis list key backing this kind.
    pub fn list_key(&self) -> &'static str {
        match self {
            WorkKind::OfferIds => "offer_ids",
            WorkKind::VenueIds => "venue_ids",
            WorkKind::VenueProviders => "venue_providers",
        }
    }

    /// All kinds, in reporting order.
    pub fn all() -> [WorkKind; 3] {
        [
            WorkKind::OfferIds,
            WorkKind::VenueIds,
            WorkKind::VenueProviders,
        ]
    }
}

impl fmt::Display for WorkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.list_key())
    }
}

/// Why a batch of ids was queued for reindexation.
///
/// Carried only for logging, so operators can trace a burst of queue
/// traffic back to the catalog path that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueReason {
    OfferCreation,
    OfferUpdate,
    OfferBatchUpdate,
    OfferManualReindexation,
    OfferReindexation,
    StockUpdate,
    StockSynchronization,
    VenueUpdate,
    VenueProviderCreation,
}

impl EnqueueReason {
    /// Stable kebab-case label used in log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            EnqueueReason::OfferCreation => "offer-creation",
            EnqueueReason::OfferUpdate => "offer-update",
            EnqueueReason::OfferBatchUpdate => "offer-batch-update",
            EnqueueReason::OfferManualReindexation => "offer-manual-reindexation",
            EnqueueReason::OfferReindexation => "offer-reindexation",
            EnqueueReason::StockUpdate => "stock-update",
            EnqueueReason::StockSynchronization => "stock-synchronization",
            EnqueueReason::VenueUpdate => "venue-update",
            EnqueueReason::VenueProviderCreation => "venue-provider-creation",
        }
    }

    /// Parses a kebab-case label back into a reason.
    pub fn from_label(label: &str) -> Option<Self> {
        EnqueueReason::all()
            .into_iter()
            .find(|reason| reason.as_str() == label)
    }

    /// All reasons, in declaration order.
    pub fn all() -> [EnqueueReason; 9] {
        [
            EnqueueReason::OfferCreation,
            EnqueueReason::OfferUpdate,
            EnqueueReason::OfferBatchUpdate,
            EnqueueReason::OfferManualReindexation,
            EnqueueReason::OfferReindexation,
            EnqueueReason::StockUpdate,
            EnqueueReason::StockSynchronization,
            EnqueueReason::VenueUpdate,
            EnqueueReason::VenueProviderCreation,
        ]
    }
}

impl fmt::Display for EnqueueReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A venue/provider pair queued after a provider synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VenueProviderRef {
    pub provider_id: i64,
    pub venue_id: i64,
}

/// The result of reading a page from the head of a queue.
///
/// `raw_len` counts every entry read, including malformed ones that were
/// dropped during parsing, so that a subsequent [`WorkQueue::clear`] with
/// this length trims exactly the range that was read.
#[derive(Debug, Clone)]
pub struct DrainedBatch<T> {
    /// Successfully parsed entries, oldest first.
    pub items: Vec<T>,
    /// Number of raw entries read, parsed or not.
    pub raw_len: usize,
}

impl<T> DrainedBatch<T> {
    /// Returns true if nothing was read from the queue.
    pub fn is_empty(&self) -> bool {
        self.raw_len == 0
    }

    /// Number of raw entries read (the length to pass to `clear`).
    pub fn len(&self) -> usize {
        self.raw_len
    }
}

/// Operations on the pending-work lists.
///
/// Enqueueing never fails into the caller: a push failure is logged and
/// dropped, since the catalog write that produced the ids has already
/// committed. Draining reads without removing; `clear` trims the range a
/// prior drain observed.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Queues offer ids for asynchronous reindexation.
    async fn enqueue_offer_ids(&self, ids: &[i64], reason: EnqueueReason);

    /// Queues venue ids for asynchronous reindexation of their offers.
    async fn enqueue_venue_ids(&self, ids: &[i64], reason: EnqueueReason);

    /// Queues a venue/provider pair for post-synchronization reindexation.
    async fn enqueue_venue_provider(&self, item: &VenueProviderRef, reason: EnqueueReason);

    /// Reads up to `max_items` offer ids from the head of the queue
    /// without removing them.
    async fn drain_offer_ids(&self, max_items: usize) -> Result<DrainedBatch<i64>, QueueError>;

    /// Reads up to `max_items` venue ids from the head of the queue
    /// without removing them.
    async fn drain_venue_ids(&self, max_items: usize) -> Result<DrainedBatch<i64>, QueueError>;

    /// Reads up to `max_items` venue/provider pairs from the head of the
    /// queue without removing them.
    async fn drain_venue_providers(
        &self,
        max_items: usize,
    ) -> Result<DrainedBatch<VenueProviderRef>, QueueError>;

    /// Removes the first `count` entries of the kind's list.
    async fn clear(&self, kind: WorkKind, count: usize) -> Result<(), QueueError>;

    /// Returns the number of pending entries for the kind.
    async fn depth(&self, kind: WorkKind) -> Result<usize, QueueError>;
}

/// Redis-backed implementation of [`WorkQueue`], one list per [`WorkKind`].
pub struct RedisWorkQueue {
    /// Redis connection manager (handles reconnection automatically).
    redis: ConnectionManager,
}

impl RedisWorkQueue {
    /// Connects to Redis and creates the work queues handle.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::ConnectionFailed` if the connection fails.
    pub async fn connect(redis_url: &str) -> Result<Self, QueueError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| QueueError::ConnectionFailed(e.to_string()))?;

        let redis = ConnectionManager::new(client)
            .await
            .map_err(|e| QueueError::ConnectionFailed(e.to_string()))?;

        Ok(Self { redis })
    }

    /// Creates a RedisWorkQueue from an existing ConnectionManager.
    ///
    /// Useful when sharing a connection across multiple components.
    pub fn from_connection(redis: ConnectionManager) -> Self {
        Self { redis }
    }

    async fn enqueue_ids(&self, kind: WorkKind, ids: &[i64], reason: EnqueueReason) {
        if ids.is_empty() {
            return;
        }

        tracing::info!(
            kind = %kind,
            reason = reason.as_str(),
            count = ids.len(),
            partial_ids = ?&ids[..ids.len().min(50)],
            "Request to asynchronously reindex ids"
        );

        let values: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        if let Err(err) = self.push_values(kind, &values).await {
            tracing::warn!(
                kind = %kind,
                count = ids.len(),
                error = %err,
                "Could not queue ids for reindexation"
            );
        }
    }

    async fn push_values(&self, kind: WorkKind, values: &[String]) -> Result<(), QueueError> {
        let mut conn = self.redis.clone();

        // Use pipeline for batch efficiency
        let mut pipe = redis::pipe();
        for value in values {
            pipe.rpush(kind.list_key(), value);
        }
        pipe.query_async::<_, ()>(&mut conn).await?;

        Ok(())
    }

    async fn read_head(&self, kind: WorkKind, max_items: usize) -> Result<Vec<String>, QueueError> {
        if max_items == 0 {
            return Ok(Vec::new());
        }

        let mut conn = self.redis.clone();
        let raw: Vec<String> = conn
            .lrange(kind.list_key(), 0, max_items as isize - 1)
            .await?;
        Ok(raw)
    }
}

#[async_trait]
impl WorkQueue for RedisWorkQueue {
    async fn enqueue_offer_ids(&self, ids: &[i64], reason: EnqueueReason) {
        self.enqueue_ids(WorkKind::OfferIds, ids, reason).await;
    }

    async fn enqueue_venue_ids(&self, ids: &[i64], reason: EnqueueReason) {
        self.enqueue_ids(WorkKind::VenueIds, ids, reason).await;
    }

    async fn enqueue_venue_provider(&self, item: &VenueProviderRef, reason: EnqueueReason) {
        tracing::info!(
            kind = %WorkKind::VenueProviders,
            reason = reason.as_str(),
            provider_id = item.provider_id,
            venue_id = item.venue_id,
            "Request to asynchronously reindex venue provider"
        );

        let payload = match serde_json::to_string(item) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!(
                    kind = %WorkKind::VenueProviders,
                    error = %err,
                    "Could not serialize venue provider for queueing"
                );
                return;
            }
        };

        if let Err(err) = self.push_values(WorkKind::VenueProviders, &[payload]).await {
            tracing::warn!(
                kind = %WorkKind::VenueProviders,
                error = %err,
                "Could not queue venue provider for reindexation"
            );
        }
    }

    async fn drain_offer_ids(&self, max_items: usize) -> Result<DrainedBatch<i64>, QueueError> {
        let raw = self.read_head(WorkKind::OfferIds, max_items).await?;
        Ok(parse_id_entries(WorkKind::OfferIds, raw))
    }

    async fn drain_venue_ids(&self, max_items: usize) -> Result<DrainedBatch<i64>, QueueError> {
        let raw = self.read_head(WorkKind::VenueIds, max_items).await?;
        Ok(parse_id_entries(WorkKind::VenueIds, raw))
    }

    async fn drain_venue_providers(
        &self,
        max_items: usize,
    ) -> Result<DrainedBatch<VenueProviderRef>, QueueError> {
        let raw = self.read_head(WorkKind::VenueProviders, max_items).await?;

        let raw_len = raw.len();
        let mut items = Vec::with_capacity(raw_len);
        for value in raw {
            match serde_json::from_str::<VenueProviderRef>(&value) {
                Ok(item) => items.push(item),
                Err(err) => {
                    tracing::warn!(
                        kind = %WorkKind::VenueProviders,
                        value = %value,
                        error = %err,
                        "Discarding malformed queue entry"
                    );
                }
            }
        }

        Ok(DrainedBatch { items, raw_len })
    }

    async fn clear(&self, kind: WorkKind, count: usize) -> Result<(), QueueError> {
        if count == 0 {
            return Ok(());
        }

        let mut conn = self.redis.clone();
        conn.ltrim::<_, ()>(kind.list_key(), count as isize, -1)
            .await?;
        Ok(())
    }

    async fn depth(&self, kind: WorkKind) -> Result<usize, QueueError> {
        let mut conn = self.redis.clone();
        let len: usize = conn.llen(kind.list_key()).await?;
        Ok(len)
    }
}

/// Parses integer id entries, dropping malformed ones but counting them in
/// `raw_len` so the caller's trim still covers the full range read.
fn parse_id_entries(kind: WorkKind, raw: Vec<String>) -> DrainedBatch<i64> {
    let raw_len = raw.len();
    let mut items = Vec::with_capacity(raw_len);
    for value in raw {
        match value.parse::<i64>() {
            Ok(id) => items.push(id),
            Err(_) => {
                tracing::warn!(
                    kind = %kind,
                    value = %value,
                    "Discarding malformed queue entry"
                );
            }
        }
    }
    DrainedBatch { items, raw_len }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_error_display() {
        let err = QueueError::ConnectionFailed("timeout".to_string());
        assert!(err.to_string().contains("timeout"));
    }

    #[test]
    fn test_work_kind_list_keys() {
        assert_eq!(WorkKind::OfferIds.list_key(), "offer_ids");
        assert_eq!(WorkKind::VenueIds.list_key(), "venue_ids");
        assert_eq!(WorkKind::VenueProviders.list_key(), "venue_providers");
    }

    #[test]
    fn test_enqueue_reason_labels() {
        assert_eq!(EnqueueReason::OfferUpdate.as_str(), "offer-update");
        assert_eq!(
            EnqueueReason::StockSynchronization.as_str(),
            "stock-synchronization"
        );
        assert_eq!(
            EnqueueReason::VenueProviderCreation.to_string(),
            "venue-provider-creation"
        );
    }

    #[test]
    fn test_enqueue_reason_label_round_trip() {
        for reason in EnqueueReason::all() {
            assert_eq!(EnqueueReason::from_label(reason.as_str()), Some(reason));
        }
        assert_eq!(EnqueueReason::from_label("unknown-reason"), None);
    }

    #[test]
    fn test_venue_provider_ref_serialization_roundtrip() {
        let item = VenueProviderRef {
            provider_id: 12,
            venue_id: 345,
        };

        let serialized = serde_json::to_string(&item).expect("serialization should work");
        assert_eq!(serialized, r#"{"providerId":12,"venueId":345}"#);

        let deserialized: VenueProviderRef =
            serde_json::from_str(&serialized).expect("deserialization should work");
        assert_eq!(deserialized, item);
    }

    #[test]
    fn test_parse_id_entries_keeps_raw_len_for_malformed_input() {
        let raw = vec![
            "1".to_string(),
            "not-a-number".to_string(),
            "3".to_string(),
        ];

        let batch = parse_id_entries(WorkKind::OfferIds, raw);
        assert_eq!(batch.items, vec![1, 3]);
        assert_eq!(batch.raw_len, 3);
        assert_eq!(batch.len(), 3);
        assert!(!batch.is_empty());
    }

    #[test]
    fn test_empty_drained_batch() {
        let batch = parse_id_entries(WorkKind::VenueIds, Vec::new());
        assert!(batch.is_empty());
        assert_eq!(batch.len(), 0);
        assert!(batch.items.is_empty());
    }
}
