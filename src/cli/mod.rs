//! Command-line interface for offersync.
//!
//! Provides the periodic entry points: queue-driven reconciliation,
//! catalog walks, provider sync dispatch, and operational helpers.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli, Commands};
