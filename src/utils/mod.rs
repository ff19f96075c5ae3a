//! Shared utility functions for offersync.
//!
//! This module provides common utilities used across multiple modules,
//! including the external id codec used at the search-engine boundary.

pub mod external_ids;

pub use external_ids::{externalize, internalize, ExternalIdError};
