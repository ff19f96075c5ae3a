//! Catalog records consumed by the indexing pipeline.
//!
//! The pipeline reads these rows from the host application's database and
//! never writes them back, with one exception: batch deactivation, which
//! flips `is_active` before queueing the offers for index re-evaluation.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};

/// A bookable stock line of an offer.
///
/// Only stocks that have not been soft-deleted reach the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Stock {
    pub price: BigDecimal,
    /// Event start time; `None` for physical and digital goods.
    pub beginning_datetime: Option<DateTime<Utc>>,
}

/// A bookable catalog item as the pipeline sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct Offer {
    pub id: i64,
    pub name: String,
    pub venue_id: i64,
    pub is_event: bool,
    /// Result of the business visibility rule, computed by the catalog
    /// query that produced this record.
    pub is_eligible_for_search: bool,
    /// Bookable stocks, soft-deleted ones excluded.
    pub stocks: Vec<Stock>,
}

impl Offer {
    /// Creates an offer with no stocks; used as a starting point in tests
    /// and by the row assembly in the catalog store.
    pub fn new(id: i64, name: impl Into<String>, venue_id: i64) -> Self {
        Self {
            id,
            name: name.into(),
            venue_id,
            is_event: false,
            is_eligible_for_search: false,
            stocks: Vec::new(),
        }
    }

    /// Builder method to mark the offer as an event.
    pub fn with_event(mut self, is_event: bool) -> Self {
        self.is_event = is_event;
        self
    }

    /// Builder method to set the visibility rule result.
    pub fn with_eligibility(mut self, eligible: bool) -> Self {
        self.is_eligible_for_search = eligible;
        self
    }

    /// Builder method to set the bookable stocks.
    pub fn with_stocks(mut self, stocks: Vec<Stock>) -> Self {
        self.stocks = stocks;
        self
    }
}
