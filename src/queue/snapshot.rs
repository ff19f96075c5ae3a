//! Cached projections of offers currently present in the search index.
//!
//! The store is a single Redis hash keyed by offer id. Field presence
//! answers "was this offer in the index before"; the value holds the
//! last-indexed projection, which the eligibility evaluator diffs against
//! to skip no-op writes during provider synchronization.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Redis hash holding one field per indexed offer.
const INDEXED_OFFERS_KEY: &str = "indexed_offers";

/// Errors that can occur during snapshot store operations.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Failed to connect to Redis.
    #[error("Redis connection failed: {0}")]
    ConnectionFailed(String),

    /// Redis operation failed.
    #[error("Redis operation failed: {0}")]
    RedisError(#[from] redis::RedisError),

    /// Failed to serialize a snapshot.
    #[error("Serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Last-indexed projection of an offer.
///
/// Equality is value-based: prices compare numerically (`10.0` equals
/// `10.00`) and event dates compare at second precision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferSnapshot {
    pub name: String,
    /// Event start times as unix seconds, sorted, empty for non-events.
    pub dates: Vec<i64>,
    /// One entry per bookable stock, sorted, duplicates retained.
    pub prices: Vec<BigDecimal>,
}

/// Presence and prior projection for one offer, as read from the store.
///
/// `existed` true with no snapshot means the hash field was present but
/// its value could not be read back; the evaluator treats that as a
/// changed offer and forces a refresh.
#[derive(Debug, Clone)]
pub struct SnapshotLookup {
    /// Whether the offer had a hash field at read time.
    pub existed: bool,
    /// The stored projection, when present and readable.
    pub snapshot: Option<OfferSnapshot>,
}

impl SnapshotLookup {
    /// Lookup for an offer that was not in the index.
    pub fn absent() -> Self {
        Self {
            existed: false,
            snapshot: None,
        }
    }

    /// Lookup for an indexed offer with a readable stored projection.
    pub fn present(snapshot: OfferSnapshot) -> Self {
        Self {
            existed: true,
            snapshot: Some(snapshot),
        }
    }
}

/// Store of last-indexed offer projections.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Fetches presence and prior projection for each id, in input order.
    async fn get_many(&self, offer_ids: &[i64]) -> Result<Vec<SnapshotLookup>, SnapshotError>;

    /// Writes or overwrites the projection for each offer.
    async fn set_many(&self, entries: &[(i64, OfferSnapshot)]) -> Result<(), SnapshotError>;

    /// Removes the entries for the given offers.
    async fn delete_many(&self, offer_ids: &[i64]) -> Result<(), SnapshotError>;

    /// Drops every stored projection.
    async fn clear_all(&self) -> Result<(), SnapshotError>;

    /// Number of offers currently recorded as indexed.
    async fn count(&self) -> Result<usize, SnapshotError>;
}

/// Redis hash implementation of [`SnapshotStore`].
pub struct RedisSnapshotStore {
    /// Redis connection manager (handles reconnection automatically).
    redis: ConnectionManager,
}

impl RedisSnapshotStore {
    /// Connects to Redis and creates the snapshot store handle.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError::ConnectionFailed` if the connection fails.
    pub async fn connect(redis_url: &str) -> Result<Self, SnapshotError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| SnapshotError::ConnectionFailed(e.to_string()))?;

        let redis = ConnectionManager::new(client)
            .await
            .map_err(|e| SnapshotError::ConnectionFailed(e.to_string()))?;

        Ok(Self { redis })
    }

    /// Creates a RedisSnapshotStore from an existing ConnectionManager.
    pub fn from_connection(redis: ConnectionManager) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl SnapshotStore for RedisSnapshotStore {
    async fn get_many(&self, offer_ids: &[i64]) -> Result<Vec<SnapshotLookup>, SnapshotError> {
        if offer_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.redis.clone();
        let fields: Vec<String> = offer_ids.iter().map(|id| id.to_string()).collect();

        let raw: Vec<Option<String>> = redis::cmd("HMGET")
            .arg(INDEXED_OFFERS_KEY)
            .arg(&fields)
            .query_async(&mut conn)
            .await?;

        let lookups = offer_ids
            .iter()
            .zip(raw)
            .map(|(offer_id, value)| match value {
                None => SnapshotLookup::absent(),
                Some(value) => match serde_json::from_str::<OfferSnapshot>(&value) {
                    Ok(snapshot) => SnapshotLookup::present(snapshot),
                    Err(err) => {
                        tracing::warn!(
                            offer_id,
                            error = %err,
                            "Stored snapshot is unreadable, offer will be refreshed"
                        );
                        SnapshotLookup {
                            existed: true,
                            snapshot: None,
                        }
                    }
                },
            })
            .collect();

        Ok(lookups)
    }

    async fn set_many(&self, entries: &[(i64, OfferSnapshot)]) -> Result<(), SnapshotError> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut conn = self.redis.clone();

        let mut pipe = redis::pipe();
        pipe.atomic();
        for (offer_id, snapshot) in entries {
            let payload = serde_json::to_string(snapshot)?;
            pipe.hset(INDEXED_OFFERS_KEY, offer_id.to_string(), payload);
        }
        pipe.query_async::<_, ()>(&mut conn).await?;

        Ok(())
    }

    async fn delete_many(&self, offer_ids: &[i64]) -> Result<(), SnapshotError> {
        if offer_ids.is_empty() {
            return Ok(());
        }

        let mut conn = self.redis.clone();
        let fields: Vec<String> = offer_ids.iter().map(|id| id.to_string()).collect();
        conn.hdel::<_, _, ()>(INDEXED_OFFERS_KEY, fields).await?;

        Ok(())
    }

    async fn clear_all(&self) -> Result<(), SnapshotError> {
        let mut conn = self.redis.clone();
        conn.del::<_, ()>(INDEXED_OFFERS_KEY).await?;
        Ok(())
    }

    async fn count(&self) -> Result<usize, SnapshotError> {
        let mut conn = self.redis.clone();
        let len: usize = conn.hlen(INDEXED_OFFERS_KEY).await?;
        Ok(len)
    }
}
