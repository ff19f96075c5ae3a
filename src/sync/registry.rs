//! Static registry of provider synchronization strategies.
//!
//! Each supported provider gets one strategy implementation that
//! renders the container command for its sync jobs. Providers the
//! registry does not know fall back to the generic strategy, which
//! drives the sync through the provider's standard stock interface.

use serde::{Deserialize, Serialize};

/// The external catalog providers this pipeline can synchronize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Cinema showtimes via the Allocine API.
    Allocine,
    /// Cinema ticketing via the CDS API.
    Cds,
    /// Book catalog via the Titelive feed.
    Titelive,
    /// Any provider using the standard stock interface.
    Generic,
}

impl ProviderKind {
    /// Stable lowercase label, used in job commands and marker keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Allocine => "allocine",
            ProviderKind::Cds => "cds",
            ProviderKind::Titelive => "titelive",
            ProviderKind::Generic => "generic",
        }
    }

    /// Maps a provider label to its kind.
    ///
    /// Unknown labels map to [`ProviderKind::Generic`] so that newly
    /// connected providers synchronize through the standard interface
    /// without a code change here.
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "allocine" => ProviderKind::Allocine,
            "cds" => ProviderKind::Cds,
            "titelive" => ProviderKind::Titelive,
            _ => ProviderKind::Generic,
        }
    }

    /// All known kinds.
    pub fn all() -> [ProviderKind; 4] {
        [
            ProviderKind::Allocine,
            ProviderKind::Cds,
            ProviderKind::Titelive,
            ProviderKind::Generic,
        ]
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Renders container commands for one provider's sync jobs.
pub trait SyncStrategy: Send + Sync {
    /// The provider this strategy serves.
    fn kind(&self) -> ProviderKind;

    /// Command for syncing one venue of this provider.
    fn venue_sync_command(&self, provider_id: i64, venue_id: i64) -> Vec<String>;

    /// Command for the provider-level worker.
    fn worker_command(&self, provider_id: i64) -> Vec<String>;
}

/// Looks up the strategy registered for a provider kind.
pub fn strategy_for(kind: ProviderKind) -> &'static dyn SyncStrategy {
    match kind {
        ProviderKind::Allocine => &AllocineStrategy,
        ProviderKind::Cds => &CdsStrategy,
        ProviderKind::Titelive => &TiteliveStrategy,
        ProviderKind::Generic => &GenericStrategy,
    }
}

fn base_command(verb: &str, kind: ProviderKind) -> Vec<String> {
    vec![
        "sync-worker".to_string(),
        verb.to_string(),
        "--provider".to_string(),
        kind.as_str().to_string(),
    ]
}

fn with_ids(mut command: Vec<String>, provider_id: i64, venue_id: Option<i64>) -> Vec<String> {
    command.push("--provider-id".to_string());
    command.push(provider_id.to_string());
    if let Some(venue_id) = venue_id {
        command.push("--venue-id".to_string());
        command.push(venue_id.to_string());
    }
    command
}

/// Allocine syncs showtimes venue by venue.
struct AllocineStrategy;

impl SyncStrategy for AllocineStrategy {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Allocine
    }

    fn venue_sync_command(&self, provider_id: i64, venue_id: i64) -> Vec<String> {
        with_ids(
            base_command("sync-showtimes", self.kind()),
            provider_id,
            Some(venue_id),
        )
    }

    fn worker_command(&self, provider_id: i64) -> Vec<String> {
        with_ids(base_command("sync-showtimes", self.kind()), provider_id, None)
    }
}

/// CDS exposes one ticketing endpoint per cinema.
struct CdsStrategy;

impl SyncStrategy for CdsStrategy {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Cds
    }

    fn venue_sync_command(&self, provider_id: i64, venue_id: i64) -> Vec<String> {
        with_ids(
            base_command("sync-shows", self.kind()),
            provider_id,
            Some(venue_id),
        )
    }

    fn worker_command(&self, provider_id: i64) -> Vec<String> {
        with_ids(base_command("sync-shows", self.kind()), provider_id, None)
    }
}

/// Titelive ships one catalog feed covering every venue at once.
struct TiteliveStrategy;

impl SyncStrategy for TiteliveStrategy {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Titelive
    }

    fn venue_sync_command(&self, provider_id: i64, venue_id: i64) -> Vec<String> {
        with_ids(
            base_command("sync-products", self.kind()),
            provider_id,
            Some(venue_id),
        )
    }

    fn worker_command(&self, provider_id: i64) -> Vec<String> {
        with_ids(base_command("sync-products", self.kind()), provider_id, None)
    }
}

/// Fallback for providers on the standard stock interface.
struct GenericStrategy;

impl SyncStrategy for GenericStrategy {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Generic
    }

    fn venue_sync_command(&self, provider_id: i64, venue_id: i64) -> Vec<String> {
        with_ids(
            base_command("sync-stocks", self.kind()),
            provider_id,
            Some(venue_id),
        )
    }

    fn worker_command(&self, provider_id: i64) -> Vec<String> {
        with_ids(base_command("sync-stocks", self.kind()), provider_id, None)
    }
}
