//! Pending lists feeding the sync dispatcher.
//!
//! Two Redis lists hold sync work the dispatcher has yet to launch:
//! venue/provider pairs waiting for a per-venue sync, and providers
//! waiting for a catalog-wide worker. Unlike the indexation queues,
//! these lists pop destructively: a popped item is either launched or
//! dropped, never re-read by a later cycle.

use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::SyncConfig;
use crate::queue::QueueError;
use crate::sync::launcher::JobSpec;
use crate::sync::registry::{strategy_for, ProviderKind};

/// One schedulable unit of provider sync work.
///
/// A target knows which pending list it lives on, how to identify
/// itself in the dispatcher's in-flight marker set, and how to render
/// the container job that performs it.
pub trait SyncTarget:
    Clone + Send + Sync + Serialize + DeserializeOwned + 'static
{
    /// Redis list holding pending targets of this kind.
    const PENDING_LIST_KEY: &'static str;

    /// Stable key identifying this target while its job is in flight.
    fn marker_key(&self) -> String;

    /// Renders the container job for this target.
    fn job_spec(&self, config: &SyncConfig) -> JobSpec;

    /// Short label for log fields.
    fn describe(&self) -> String;
}

fn worker_env(spec: JobSpec, config: &SyncConfig) -> JobSpec {
    spec.with_env("DATABASE_URL", &config.database_url)
        .with_env("REDIS_URL", &config.redis_url)
}

/// A venue waiting to be synchronized through one of its providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VenueProviderSync {
    pub provider: ProviderKind,
    pub provider_id: i64,
    pub venue_id: i64,
}

impl SyncTarget for VenueProviderSync {
    const PENDING_LIST_KEY: &'static str = "pending_venue_provider_syncs";

    fn marker_key(&self) -> String {
        format!("venue_provider:{}:{}", self.provider_id, self.venue_id)
    }

    fn job_spec(&self, config: &SyncConfig) -> JobSpec {
        let strategy = strategy_for(self.provider);
        let name = format!(
            "offersync-{}-{}-{}-{}",
            self.provider,
            self.provider_id,
            self.venue_id,
            Utc::now().timestamp()
        );
        let spec = JobSpec::new(
            name,
            config.provider_sync_image.clone(),
            strategy.venue_sync_command(self.provider_id, self.venue_id),
        );
        worker_env(spec, config)
    }

    fn describe(&self) -> String {
        format!(
            "venue {} via provider {} ({})",
            self.venue_id, self.provider_id, self.provider
        )
    }
}

/// A provider waiting for its catalog-wide sync worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderWorkerSync {
    pub provider: ProviderKind,
    pub provider_id: i64,
}

impl SyncTarget for ProviderWorkerSync {
    const PENDING_LIST_KEY: &'static str = "pending_provider_workers";

    fn marker_key(&self) -> String {
        format!("provider_worker:{}", self.provider_id)
    }

    fn job_spec(&self, config: &SyncConfig) -> JobSpec {
        let strategy = strategy_for(self.provider);
        let name = format!(
            "offersync-{}-{}-{}",
            self.provider,
            self.provider_id,
            Utc::now().timestamp()
        );
        let spec = JobSpec::new(
            name,
            config.provider_sync_image.clone(),
            strategy.worker_command(self.provider_id),
        );
        worker_env(spec, config)
    }

    fn describe(&self) -> String {
        format!("provider {} ({})", self.provider_id, self.provider)
    }
}

/// Storage for pending sync targets of one kind.
#[async_trait]
pub trait PendingSyncs<T: SyncTarget>: Send + Sync {
    /// Appends a target to the tail of the pending list.
    async fn push(&self, target: &T) -> Result<(), QueueError>;

    /// Pops the oldest pending target, skipping malformed entries.
    async fn pop_head(&self) -> Result<Option<T>, QueueError>;

    /// Number of targets still pending.
    async fn depth(&self) -> Result<usize, QueueError>;
}

/// Redis-backed implementation of [`PendingSyncs`].
pub struct RedisPendingSyncs {
    /// Redis connection manager (handles reconnection automatically).
    redis: ConnectionManager,
}

impl RedisPendingSyncs {
    /// Connects to Redis and creates the pending-list handle.
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

    /// Creates a RedisPendingSyncs from an existing ConnectionManager.
    pub fn from_connection(redis: ConnectionManager) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl<T: SyncTarget> PendingSyncs<T> for RedisPendingSyncs {
    async fn push(&self, target: &T) -> Result<(), QueueError> {
        let payload = serde_json::to_string(target)?;
        let mut conn = self.redis.clone();
        conn.rpush::<_, _, ()>(T::PENDING_LIST_KEY, payload).await?;
        Ok(())
    }

    async fn pop_head(&self) -> Result<Option<T>, QueueError> {
        let mut conn = self.redis.clone();
        loop {
            let raw: Option<String> = conn.lpop(T::PENDING_LIST_KEY, None).await?;
            let Some(value) = raw else {
                return Ok(None);
            };

            match serde_json::from_str::<T>(&value) {
                Ok(target) => return Ok(Some(target)),
                Err(err) => {
                    tracing::warn!(
                        list = T::PENDING_LIST_KEY,
                        value = %value,
                        error = %err,
                        "Discarding malformed pending sync entry"
                    );
                }
            }
        }
    }

    async fn depth(&self) -> Result<usize, QueueError> {
        let mut conn = self.redis.clone();
        let len: usize = conn.llen(T::PENDING_LIST_KEY).await?;
        Ok(len)
    }
}
