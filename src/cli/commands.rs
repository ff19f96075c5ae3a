//! CLI command definitions for offersync.
//!
//! Each command builds its components from environment configuration,
//! runs one cycle (or loops under `--watch`), and prints a JSON summary.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::catalog::{CatalogStore, PgCatalogStore};
use crate::config::SyncConfig;
use crate::indexing::{IndexingOrchestrator, ReconciliationDriver, ReconciliationReport};
use crate::metrics::{export_metrics, MetricsCollector};
use crate::queue::{
    EnqueueReason, RedisSnapshotStore, RedisWorkQueue, SnapshotStore, VenueProviderRef, WorkKind,
    WorkQueue,
};
use crate::search::{AlgoliaClient, SearchIndex};
use crate::sync::{
    BoundedSyncDispatcher, DockerJobLauncher, JobLauncher, PendingSyncs, ProviderKind,
    ProviderWorkerSync, RedisPendingSyncs, SyncTarget, VenueProviderSync,
};

/// Offer search synchronization pipeline.
#[derive(Parser)]
#[command(name = "offersync")]
#[command(about = "Keep the offer search index synchronized with the catalog")]
#[command(version)]
#[command(
    long_about = "offersync drains reindexation queues into the search index, walks the catalog \
for full and expired-offer reconciliation, and launches bounded provider sync jobs.\n\nExample usage:\n  \
offersync index offers\n  offersync index all\n  offersync sync venue-providers"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Reconcile the search index with the catalog.
    Index(IndexArgs),

    /// Launch pending provider synchronization jobs.
    Sync(SyncArgs),

    /// Push work onto the reindexation queues or sync pending lists.
    Enqueue(EnqueueArgs),

    /// Delete every document from the search index and reset snapshots.
    ClearIndex(ClearIndexArgs),

    /// Print current queue depths and counters in Prometheus text format.
    Metrics,
}

/// Arguments for `offersync index`.
#[derive(Parser, Debug)]
pub struct IndexArgs {
    /// Reconciliation mode to run.
    #[command(subcommand)]
    pub mode: IndexMode,
}

/// Reconciliation modes.
#[derive(clap::Subcommand, Debug)]
pub enum IndexMode {
    /// Drain the offer-id queue into the index.
    Offers(IndexOffersArgs),

    /// Drain the venue-id queue, reindexing each venue's offers.
    Venues(WatchArgs),

    /// Drain the venue/provider queue after provider synchronizations.
    VenueProviders(WatchArgs),

    /// Walk every active offer in the catalog (first-run or repair).
    All,

    /// Remove offers whose last bookable stock has expired.
    Expired,
}

/// Arguments for `offersync index offers`.
#[derive(Parser, Debug)]
pub struct IndexOffersArgs {
    /// Keep draining even when a batch comes back smaller than the
    /// chunk size; stop only on an empty queue.
    #[arg(long)]
    pub stop_only_when_empty: bool,

    /// Run cycles forever instead of exiting after one.
    #[arg(long)]
    pub watch: bool,

    /// Seconds to sleep between cycles with --watch.
    #[arg(long, default_value = "60")]
    pub interval: u64,
}

/// Watch-loop arguments shared by the queue-driven modes.
#[derive(Parser, Debug)]
pub struct WatchArgs {
    /// Run cycles forever instead of exiting after one.
    #[arg(long)]
    pub watch: bool,

    /// Seconds to sleep between cycles with --watch.
    #[arg(long, default_value = "60")]
    pub interval: u64,
}

/// Arguments for `offersync sync`.
#[derive(Parser, Debug)]
pub struct SyncArgs {
    /// Which pending list to dispatch.
    #[command(subcommand)]
    pub target: SyncTargetArg,
}

/// Dispatchable sync target kinds.
#[derive(clap::Subcommand, Debug)]
pub enum SyncTargetArg {
    /// Launch one job per pending venue/provider pair.
    VenueProviders,

    /// Launch one catalog-wide worker per pending provider.
    Providers,
}

/// Arguments for `offersync enqueue`.
#[derive(Parser, Debug)]
pub struct EnqueueArgs {
    /// What to enqueue.
    #[command(subcommand)]
    pub target: EnqueueTarget,
}

/// Enqueueable work kinds.
#[derive(clap::Subcommand, Debug)]
pub enum EnqueueTarget {
    /// Queue offer ids for reindexation.
    Offers {
        /// Comma-separated offer ids.
        #[arg(long)]
        ids: String,

        /// Reason label recorded in logs.
        #[arg(long, default_value = "offer-manual-reindexation")]
        reason: String,
    },

    /// Queue venue ids so each venue's offers are reindexed.
    Venues {
        /// Comma-separated venue ids.
        #[arg(long)]
        ids: String,

        /// Reason label recorded in logs.
        #[arg(long, default_value = "venue-update")]
        reason: String,
    },

    /// Queue one venue/provider pair for post-sync reindexation.
    VenueProvider {
        #[arg(long)]
        provider_id: i64,

        #[arg(long)]
        venue_id: i64,
    },

    /// Queue a venue sync job for the dispatcher.
    SyncVenueProvider {
        /// Provider label (allocine, cds, titelive, or anything else
        /// for the generic strategy).
        #[arg(long)]
        provider: String,

        #[arg(long)]
        provider_id: i64,

        #[arg(long)]
        venue_id: i64,
    },

    /// Queue a catalog-wide provider worker for the dispatcher.
    SyncProvider {
        /// Provider label (allocine, cds, titelive, or anything else
        /// for the generic strategy).
        #[arg(long)]
        provider: String,

        #[arg(long)]
        provider_id: i64,
    },
}

/// Arguments for `offersync clear-index`.
#[derive(Parser, Debug)]
pub struct ClearIndexArgs {
    /// Confirm the wipe. Without this flag the command refuses to run.
    #[arg(long)]
    pub yes: bool,
}

/// Parse CLI arguments without running a command.
///
/// Exposed separately so `main` can read `--log-level` before
/// initializing tracing.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Index(args) => {
            run_index_command(args).await?;
        }
        Commands::Sync(args) => {
            run_sync_command(args).await?;
        }
        Commands::Enqueue(args) => {
            run_enqueue_command(args).await?;
        }
        Commands::ClearIndex(args) => {
            run_clear_index_command(args).await?;
        }
        Commands::Metrics => {
            run_metrics_command().await?;
        }
    }
    Ok(())
}

// ============================================================================
// Index Command
// ============================================================================

#[derive(Debug, Clone, Serialize)]
struct IndexOutput {
    status: String,
    mode: String,
    cycles: usize,
    pages: usize,
    added: usize,
    updated: usize,
    removed: usize,
    skipped: usize,
}

async fn build_driver(config: &SyncConfig) -> anyhow::Result<ReconciliationDriver> {
    let queue = Arc::new(RedisWorkQueue::connect(&config.redis_url).await?);
    let snapshots = Arc::new(RedisSnapshotStore::connect(&config.redis_url).await?);
    let catalog: Arc<dyn CatalogStore> =
        Arc::new(PgCatalogStore::connect(&config.database_url).await?);
    let search = Arc::new(AlgoliaClient::from_config(config));

    let orchestrator = IndexingOrchestrator::new(Arc::clone(&catalog), snapshots, search);
    Ok(ReconciliationDriver::new(
        queue,
        catalog,
        orchestrator,
        config.clone(),
    ))
}

async fn run_index_command(args: IndexArgs) -> anyhow::Result<()> {
    let config = SyncConfig::from_env()?;
    let driver = build_driver(&config).await?;
    let metrics = MetricsCollector::new();

    let (mode, watch, interval) = match &args.mode {
        IndexMode::Offers(a) => ("offers", a.watch, a.interval),
        IndexMode::Venues(a) => ("venues", a.watch, a.interval),
        IndexMode::VenueProviders(a) => ("venue-providers", a.watch, a.interval),
        IndexMode::All => ("all", false, 0),
        IndexMode::Expired => ("expired", false, 0),
    };

    let mut cycles = 0usize;
    let mut total = ReconciliationReport::default();

    loop {
        let result = match &args.mode {
            IndexMode::Offers(a) => {
                driver
                    .index_offers_from_queue(a.stop_only_when_empty)
                    .await
            }
            IndexMode::Venues(_) => driver.index_venues_from_queue().await,
            IndexMode::VenueProviders(_) => driver.index_venue_providers_from_queue().await,
            IndexMode::All => driver.index_all_offers().await,
            IndexMode::Expired => driver.purge_expired_offers().await,
        };

        match result {
            Ok(report) => {
                cycles += 1;
                total.pages += report.pages;
                total.added += report.added;
                total.updated += report.updated;
                total.removed += report.removed;
                total.skipped += report.skipped;
            }
            Err(err) => {
                metrics.record_cycle_aborted();
                if !watch {
                    return Err(err.into());
                }
                error!(mode, error = %err, "Reconciliation cycle aborted");
            }
        }

        if !watch {
            break;
        }
        tokio::time::sleep(Duration::from_secs(interval)).await;
    }

    let output = IndexOutput {
        status: "success".to_string(),
        mode: mode.to_string(),
        cycles,
        pages: total.pages,
        added: total.added,
        updated: total.updated,
        removed: total.removed,
        skipped: total.skipped,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

// ============================================================================
// Sync Command
// ============================================================================

#[derive(Debug, Clone, Serialize)]
struct SyncOutput {
    status: String,
    target: String,
    launched: usize,
    failed: usize,
    skipped_duplicates: usize,
}

async fn run_sync_command(args: SyncArgs) -> anyhow::Result<()> {
    let config = SyncConfig::from_env()?;

    let output = match args.target {
        SyncTargetArg::VenueProviders => {
            dispatch_sync::<VenueProviderSync>(&config, "venue-providers").await?
        }
        SyncTargetArg::Providers => {
            dispatch_sync::<ProviderWorkerSync>(&config, "providers").await?
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn dispatch_sync<T: SyncTarget>(
    config: &SyncConfig,
    target: &str,
) -> anyhow::Result<SyncOutput> {
    let pending: Arc<dyn PendingSyncs<T>> =
        Arc::new(RedisPendingSyncs::connect(&config.redis_url).await?);
    let launcher: Arc<dyn JobLauncher> = Arc::new(DockerJobLauncher::new()?);
    let dispatcher = BoundedSyncDispatcher::new(pending, launcher, config.clone());
    let metrics = MetricsCollector::new();

    let report = match dispatcher.run_cycle().await {
        Ok(report) => report,
        Err(err) => {
            metrics.record_cycle_aborted();
            return Err(err.into());
        }
    };

    // Launched containers are only removed once their waiter observes
    // completion, so stay alive until the last job reports back.
    loop {
        let in_flight = dispatcher.in_flight_count().await;
        if in_flight == 0 {
            break;
        }
        info!(in_flight, "Waiting for launched sync jobs to finish");
        tokio::time::sleep(config.provider_sync_wait_interval).await;
    }

    Ok(SyncOutput {
        status: "success".to_string(),
        target: target.to_string(),
        launched: report.launched,
        failed: report.failed,
        skipped_duplicates: report.skipped_duplicates,
    })
}

// ============================================================================
// Enqueue Command
// ============================================================================

#[derive(Debug, Clone, Serialize)]
struct EnqueueOutput {
    status: String,
    list: String,
    count: usize,
}

async fn run_enqueue_command(args: EnqueueArgs) -> anyhow::Result<()> {
    let config = SyncConfig::from_env()?;

    let output = match args.target {
        EnqueueTarget::Offers { ids, reason } => {
            let ids = parse_id_list(&ids)?;
            let reason = parse_reason(&reason)?;
            let queue = RedisWorkQueue::connect(&config.redis_url).await?;
            queue.enqueue_offer_ids(&ids, reason).await;
            EnqueueOutput {
                status: "success".to_string(),
                list: WorkKind::OfferIds.list_key().to_string(),
                count: ids.len(),
            }
        }
        EnqueueTarget::Venues { ids, reason } => {
            let ids = parse_id_list(&ids)?;
            let reason = parse_reason(&reason)?;
            let queue = RedisWorkQueue::connect(&config.redis_url).await?;
            queue.enqueue_venue_ids(&ids, reason).await;
            EnqueueOutput {
                status: "success".to_string(),
                list: WorkKind::VenueIds.list_key().to_string(),
                count: ids.len(),
            }
        }
        EnqueueTarget::VenueProvider {
            provider_id,
            venue_id,
        } => {
            let queue = RedisWorkQueue::connect(&config.redis_url).await?;
            let item = VenueProviderRef {
                provider_id,
                venue_id,
            };
            queue
                .enqueue_venue_provider(&item, EnqueueReason::VenueProviderCreation)
                .await;
            EnqueueOutput {
                status: "success".to_string(),
                list: WorkKind::VenueProviders.list_key().to_string(),
                count: 1,
            }
        }
        EnqueueTarget::SyncVenueProvider {
            provider,
            provider_id,
            venue_id,
        } => {
            let pending = RedisPendingSyncs::connect(&config.redis_url).await?;
            let target = VenueProviderSync {
                provider: ProviderKind::from_name(&provider),
                provider_id,
                venue_id,
            };
            PendingSyncs::push(&pending, &target).await?;
            EnqueueOutput {
                status: "success".to_string(),
                list: VenueProviderSync::PENDING_LIST_KEY.to_string(),
                count: 1,
            }
        }
        EnqueueTarget::SyncProvider {
            provider,
            provider_id,
        } => {
            let pending = RedisPendingSyncs::connect(&config.redis_url).await?;
            let target = ProviderWorkerSync {
                provider: ProviderKind::from_name(&provider),
                provider_id,
            };
            PendingSyncs::push(&pending, &target).await?;
            EnqueueOutput {
                status: "success".to_string(),
                list: ProviderWorkerSync::PENDING_LIST_KEY.to_string(),
                count: 1,
            }
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn parse_id_list(raw: &str) -> anyhow::Result<Vec<i64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<i64>()
                .map_err(|_| anyhow::anyhow!("Invalid id in --ids: '{}'", part))
        })
        .collect()
}

fn parse_reason(raw: &str) -> anyhow::Result<EnqueueReason> {
    EnqueueReason::from_label(raw).ok_or_else(|| {
        let known: Vec<&str> = EnqueueReason::all().iter().map(|r| r.as_str()).collect();
        anyhow::anyhow!(
            "Unknown reason '{}'; expected one of: {}",
            raw,
            known.join(", ")
        )
    })
}

// ============================================================================
// Clear Index Command
// ============================================================================

#[derive(Debug, Clone, Serialize)]
struct ClearIndexOutput {
    status: String,
    index_name: String,
}

async fn run_clear_index_command(args: ClearIndexArgs) -> anyhow::Result<()> {
    let config = SyncConfig::from_env()?;

    if !config.enable_clearing_index {
        return Err(anyhow::anyhow!(
            "Index clearing is disabled; set ENABLE_CLEARING_INDEX=true to allow it"
        ));
    }
    if !args.yes {
        return Err(anyhow::anyhow!(
            "Refusing to clear the index without --yes; this deletes every document"
        ));
    }

    let search = AlgoliaClient::from_config(&config);
    let snapshots = RedisSnapshotStore::connect(&config.redis_url).await?;

    info!(index_name = %search.index_name(), "Clearing the search index");
    search.clear_all().await?;
    // Without the snapshot wipe, the next reindex would skip offers the
    // index no longer contains.
    snapshots.clear_all().await?;

    let output = ClearIndexOutput {
        status: "success".to_string(),
        index_name: search.index_name().to_string(),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

// ============================================================================
// Metrics Command
// ============================================================================

async fn run_metrics_command() -> anyhow::Result<()> {
    let config = SyncConfig::from_env()?;
    let collector = MetricsCollector::new();

    let queue = RedisWorkQueue::connect(&config.redis_url).await?;
    for kind in WorkKind::all() {
        match queue.depth(kind).await {
            Ok(depth) => collector.update_queue_depth(kind.list_key(), depth),
            Err(err) => warn!(kind = %kind, error = %err, "Could not read queue depth"),
        }
    }

    let pending = RedisPendingSyncs::connect(&config.redis_url).await?;
    match <RedisPendingSyncs as PendingSyncs<VenueProviderSync>>::depth(&pending).await {
        Ok(depth) => collector.update_queue_depth(VenueProviderSync::PENDING_LIST_KEY, depth),
        Err(err) => warn!(
            list = VenueProviderSync::PENDING_LIST_KEY,
            error = %err,
            "Could not read pending list depth"
        ),
    }
    match <RedisPendingSyncs as PendingSyncs<ProviderWorkerSync>>::depth(&pending).await {
        Ok(depth) => collector.update_queue_depth(ProviderWorkerSync::PENDING_LIST_KEY, depth),
        Err(err) => warn!(
            list = ProviderWorkerSync::PENDING_LIST_KEY,
            error = %err,
            "Could not read pending list depth"
        ),
    }

    print!("{}", export_metrics());
    Ok(())
}
