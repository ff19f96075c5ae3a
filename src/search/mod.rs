//! Search index integration.
//!
//! The index only ever sees externalized offer ids (see
//! [`crate::utils::external_ids`]) and flat documents built from the
//! catalog projection. All index writes go through the [`SearchIndex`]
//! trait so the indexing pipeline can be exercised without a live
//! engine.

pub mod client;
pub mod documents;

pub use client::{AlgoliaClient, SearchError, SearchIndex};
pub use documents::OfferDocument;
