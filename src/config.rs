//! Runtime configuration for the synchronization pipeline.
//!
//! This module provides configuration options for the indexing pipeline,
//! including queue and snapshot store connections, search engine credentials,
//! reconciliation batch sizes, and provider sync dispatch limits.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    /// IO error while reading configuration.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration for the offer search synchronization pipeline.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    // Connection settings
    /// Redis connection URL for the work queues and snapshot store.
    pub redis_url: String,
    /// PostgreSQL database connection URL for the offer catalog.
    pub database_url: String,

    // Search engine settings
    /// Application id of the search engine account.
    pub algolia_application_id: String,
    /// Write API key for the search engine.
    pub algolia_api_key: String,
    /// Name of the offers index.
    pub algolia_offers_index_name: String,
    /// Override for the search engine base URL (used in tests).
    pub algolia_api_base: Option<String>,

    // Reconciliation batch sizes
    /// Offer ids drained from the queue per indexing page.
    pub offer_ids_chunk_size: usize,
    /// Venue ids drained from the queue per reconciliation page.
    pub venue_ids_chunk_size: usize,
    /// Offers fetched per page when reindexing a whole venue.
    pub offers_by_venue_chunk_size: usize,
    /// Offer ids processed per page when purging expired offers.
    pub deleting_offers_chunk_size: usize,

    // Provider sync settings
    /// Maximum number of provider sync jobs allowed in flight at once.
    pub provider_sync_pool_size: usize,
    /// How long the dispatcher waits before re-checking a full pool.
    pub provider_sync_wait_interval: Duration,
    /// Container image used to run provider sync jobs.
    pub provider_sync_image: String,

    // Safety switches
    /// Whether the destructive clear-index operation is allowed to run.
    pub enable_clearing_index: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            // Connection defaults
            redis_url: "redis://localhost:6379".to_string(),
            database_url: "postgres://localhost/offersync".to_string(),

            // Search engine defaults
            algolia_application_id: "dummy-app-id".to_string(),
            algolia_api_key: "dummy-key".to_string(),
            algolia_offers_index_name: "offers".to_string(),
            algolia_api_base: None,

            // Batch size defaults
            offer_ids_chunk_size: 1000,
            venue_ids_chunk_size: 1000,
            offers_by_venue_chunk_size: 10_000,
            deleting_offers_chunk_size: 10_000,

            // Provider sync defaults
            provider_sync_pool_size: 10,
            provider_sync_wait_interval: Duration::from_secs(60),
            provider_sync_image: "offersync/provider-worker:latest".to_string(),

            // Safety defaults
            enable_clearing_index: false,
        }
    }
}

impl SyncConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `REDIS_URL`: Redis connection URL (default: redis://localhost:6379)
    /// - `DATABASE_URL`: PostgreSQL connection URL (required)
    /// - `ALGOLIA_APPLICATION_ID`: Search engine application id
    /// - `ALGOLIA_API_KEY`: Search engine write key
    /// - `ALGOLIA_OFFERS_INDEX_NAME`: Offers index name (default: offers)
    /// - `ALGOLIA_API_BASE`: Search engine base URL override
    /// - `REDIS_OFFER_IDS_CHUNK_SIZE`: Offer ids per indexing page (default: 1000)
    /// - `REDIS_VENUE_IDS_CHUNK_SIZE`: Venue ids per page (default: 1000)
    /// - `ALGOLIA_OFFERS_BY_VENUE_CHUNK_SIZE`: Offers per venue page (default: 10000)
    /// - `ALGOLIA_DELETING_OFFERS_CHUNK_SIZE`: Offer ids per purge page (default: 10000)
    /// - `PROVIDER_SYNC_POOL_SIZE`: Concurrent sync job limit (default: 10)
    /// - `PROVIDER_SYNC_WAIT_INTERVAL_SECS`: Full-pool wait in seconds (default: 60)
    /// - `PROVIDER_SYNC_IMAGE`: Container image for sync jobs
    /// - `ENABLE_CLEARING_INDEX`: Allow the clear-index command (default: false)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or have invalid values.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        // Connection settings - DATABASE_URL is required
        if let Ok(val) = std::env::var("REDIS_URL") {
            config.redis_url = val;
        }

        config.database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?;

        // Search engine settings
        if let Ok(val) = std::env::var("ALGOLIA_APPLICATION_ID") {
            config.algolia_application_id = val;
        }

        if let Ok(val) = std::env::var("ALGOLIA_API_KEY") {
            config.algolia_api_key = val;
        }

        if let Ok(val) = std::env::var("ALGOLIA_OFFERS_INDEX_NAME") {
            config.algolia_offers_index_name = val;
        }

        if let Ok(val) = std::env::var("ALGOLIA_API_BASE") {
            config.algolia_api_base = Some(val);
        }

        // Batch sizes
        if let Ok(val) = std::env::var("REDIS_OFFER_IDS_CHUNK_SIZE") {
            config.offer_ids_chunk_size = parse_env_value(&val, "REDIS_OFFER_IDS_CHUNK_SIZE")?;
        }

        if let Ok(val) = std::env::var("REDIS_VENUE_IDS_CHUNK_SIZE") {
            config.venue_ids_chunk_size = parse_env_value(&val, "REDIS_VENUE_IDS_CHUNK_SIZE")?;
        }

        if let Ok(val) = std::env::var("ALGOLIA_OFFERS_BY_VENUE_CHUNK_SIZE") {
            config.offers_by_venue_chunk_size =
                parse_env_value(&val, "ALGOLIA_OFFERS_BY_VENUE_CHUNK_SIZE")?;
        }

        if let Ok(val) = std::env::var("ALGOLIA_DELETING_OFFERS_CHUNK_SIZE") {
            config.deleting_offers_chunk_size =
                parse_env_value(&val, "ALGOLIA_DELETING_OFFERS_CHUNK_SIZE")?;
        }

        // Provider sync settings
        if let Ok(val) = std::env::var("PROVIDER_SYNC_POOL_SIZE") {
            config.provider_sync_pool_size = parse_env_value(&val, "PROVIDER_SYNC_POOL_SIZE")?;
        }

        if let Ok(val) = std::env::var("PROVIDER_SYNC_WAIT_INTERVAL_SECS") {
            let secs: u64 = parse_env_value(&val, "PROVIDER_SYNC_WAIT_INTERVAL_SECS")?;
            config.provider_sync_wait_interval = Duration::from_secs(secs);
        }

        if let Ok(val) = std::env::var("PROVIDER_SYNC_IMAGE") {
            config.provider_sync_image = val;
        }

        // Safety switches
        if let Ok(val) = std::env::var("ENABLE_CLEARING_INDEX") {
            config.enable_clearing_index = parse_env_bool(&val, "ENABLE_CLEARING_INDEX")?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Connection validation
        if self.redis_url.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "redis_url cannot be empty".to_string(),
            ));
        }

        if self.database_url.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "database_url cannot be empty".to_string(),
            ));
        }

        // Search engine validation
        if self.algolia_application_id.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "algolia_application_id cannot be empty".to_string(),
            ));
        }

        if self.algolia_offers_index_name.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "algolia_offers_index_name cannot be empty".to_string(),
            ));
        }

        // Batch size validation
        if self.offer_ids_chunk_size == 0 {
            return Err(ConfigError::ValidationFailed(
                "offer_ids_chunk_size must be greater than 0".to_string(),
            ));
        }

        if self.venue_ids_chunk_size == 0 {
            return Err(ConfigError::ValidationFailed(
                "venue_ids_chunk_size must be greater than 0".to_string(),
            ));
        }

        if self.offers_by_venue_chunk_size == 0 {
            return Err(ConfigError::ValidationFailed(
                "offers_by_venue_chunk_size must be greater than 0".to_string(),
            ));
        }

        if self.deleting_offers_chunk_size == 0 {
            return Err(ConfigError::ValidationFailed(
                "deleting_offers_chunk_size must be greater than 0".to_string(),
            ));
        }

        // Provider sync validation
        if self.provider_sync_pool_size == 0 {
            return Err(ConfigError::ValidationFailed(
                "provider_sync_pool_size must be greater than 0".to_string(),
            ));
        }

        if self.provider_sync_wait_interval.as_secs() == 0 {
            return Err(ConfigError::ValidationFailed(
                "provider_sync_wait_interval must be greater than 0".to_string(),
            ));
        }

        if self.provider_sync_image.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "provider_sync_image cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Builder method to set the Redis URL.
    pub fn with_redis_url(mut self, url: impl Into<String>) -> Self {
        self.redis_url = url.into();
        self
    }

    /// Builder method to set the database URL.
    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = url.into();
        self
    }

    /// Builder method to set the search engine application id.
    pub fn with_algolia_application_id(mut self, app_id: impl Into<String>) -> Self {
        self.algolia_application_id = app_id.into();
        self
    }

    /// Builder method to set the search engine API key.
    pub fn with_algolia_api_key(mut self, key: impl Into<String>) -> Self {
        self.algolia_api_key = key.into();
        self
    }

    /// Builder method to set the offers index name.
    pub fn with_offers_index_name(mut self, name: impl Into<String>) -> Self {
        self.algolia_offers_index_name = name.into();
        self
    }

    /// Builder method to set the search engine base URL.
    pub fn with_algolia_api_base(mut self, base: impl Into<String>) -> Self {
        self.algolia_api_base = Some(base.into());
        self
    }

    /// Builder method to set the offer ids chunk size.
    pub fn with_offer_ids_chunk_size(mut self, size: usize) -> Self {
        self.offer_ids_chunk_size = size;
        self
    }

    /// Builder method to set the venue ids chunk size.
    pub fn with_venue_ids_chunk_size(mut self, size: usize) -> Self {
        self.venue_ids_chunk_size = size;
        self
    }

    /// Builder method to set the offers-by-venue chunk size.
    pub fn with_offers_by_venue_chunk_size(mut self, size: usize) -> Self {
        self.offers_by_venue_chunk_size = size;
        self
    }

    /// Builder method to set the expired-offer purge chunk size.
    pub fn with_deleting_offers_chunk_size(mut self, size: usize) -> Self {
        self.deleting_offers_chunk_size = size;
        self
    }

    /// Builder method to set the provider sync pool size.
    pub fn with_provider_sync_pool_size(mut self, size: usize) -> Self {
        self.provider_sync_pool_size = size;
        self
    }

    /// Builder method to set the full-pool wait interval.
    pub fn with_provider_sync_wait_interval(mut self, interval: Duration) -> Self {
        self.provider_sync_wait_interval = interval;
        self
    }

    /// Builder method to set the provider sync container image.
    pub fn with_provider_sync_image(mut self, image: impl Into<String>) -> Self {
        self.provider_sync_image = image.into();
        self
    }

    /// Builder method to allow or forbid the clear-index command.
    pub fn with_clearing_index_enabled(mut self, enabled: bool) -> Self {
        self.enable_clearing_index = enabled;
        self
    }
}

/// Parse an environment variable value into a type.
fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}

/// Parse an environment variable as a boolean.
fn parse_env_bool(value: &str, key: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected boolean value, got '{}'", value),
        }),
    }
}
