//! Shared Redis state behind the indexing pipeline.
//!
//! This module provides the two durable structures the pipeline shares
//! with the rest of the system:
//!
//! - **WorkQueue**: FIFO lists of pending work (offer ids, venue ids,
//!   venue/provider pairs), appended by catalog-mutation code and drained
//!   by the reconciliation driver
//! - **SnapshotStore**: a hash of last-indexed offer projections used for
//!   change detection and index-membership checks
//!
//! # Draining Model
//!
//! ```text
//!   catalog writes ──RPUSH──▶ [ offer_ids list ] ──LRANGE page──▶ driver
//!                                     ▲                             │
//!                                     └────────── LTRIM ◀──────────┘
//!                                             (after success)
//! ```
//!
//! Pages are read non-destructively and trimmed only after the page has
//! been processed (for the offer-id kind) or before processing starts
//! (for the venue-provider kind); the per-kind clearing boundary is
//! chosen by the driver, not here.

pub mod snapshot;
pub mod work_queue;

// Re-export main types for convenience
pub use snapshot::{
    OfferSnapshot, RedisSnapshotStore, SnapshotError, SnapshotLookup, SnapshotStore,
};
pub use work_queue::{
    DrainedBatch, EnqueueReason, QueueError, RedisWorkQueue, VenueProviderRef, WorkKind, WorkQueue,
};
