//! Provider synchronization dispatch.
//!
//! Providers are synchronized by short-lived container jobs, not by
//! this process: the modules here only decide which jobs to launch and
//! keep the number of concurrent jobs bounded. Pending targets arrive
//! on Redis lists ([`pending`]), a static registry picks the command
//! for each provider ([`registry`]), containers run through a
//! [`launcher`], and the [`dispatcher`] ties the three together.

pub mod dispatcher;
pub mod launcher;
pub mod pending;
pub mod registry;

pub use dispatcher::{BoundedSyncDispatcher, DispatchReport};
pub use launcher::{DockerJobLauncher, JobHandle, JobLauncher, JobOutcome, JobSpec, LaunchError};
pub use pending::{PendingSyncs, ProviderWorkerSync, RedisPendingSyncs, SyncTarget, VenueProviderSync};
pub use registry::{strategy_for, ProviderKind, SyncStrategy};
