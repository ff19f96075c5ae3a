//! Pure reindex decision logic.
//!
//! Given an offer, its last-known indexed state, and the origin of the
//! request, decide whether the search index needs a write. Provider
//! syncs run at full catalog volume, so they diff the offer against its
//! stored snapshot to avoid flooding the engine with no-op updates.
//! Manual and direct-edit paths are low volume and always refresh.

use crate::catalog::Offer;
use crate::queue::OfferSnapshot;

/// The action to take for one offer during an indexing pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The offer is eligible and not yet indexed.
    Add,
    /// The offer is eligible and its indexed document must be refreshed.
    Update,
    /// The offer is no longer eligible and must leave the index.
    Remove,
    /// Nothing to do for this offer.
    Skip,
}

impl Decision {
    /// Whether this decision results in an index upsert.
    pub fn is_upsert(&self) -> bool {
        matches!(self, Decision::Add | Decision::Update)
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Decision::Add => "add",
            Decision::Update => "update",
            Decision::Remove => "remove",
            Decision::Skip => "skip",
        };
        write!(f, "{}", name)
    }
}

/// Builds the indexed projection of an offer.
///
/// Prices are one entry per stock, sorted, with duplicates retained so
/// that adding a second stock at an existing price still registers as a
/// change. Event dates are the stocks' start times as unix seconds,
/// sorted; non-event offers always project an empty date list.
pub fn project(offer: &Offer) -> OfferSnapshot {
    let mut prices: Vec<_> = offer.stocks.iter().map(|stock| stock.price.clone()).collect();
    prices.sort();

    let mut dates: Vec<i64> = if offer.is_event {
        offer
            .stocks
            .iter()
            .filter_map(|stock| stock.beginning_datetime.map(|dt| dt.timestamp()))
            .collect()
    } else {
        Vec::new()
    };
    dates.sort_unstable();

    OfferSnapshot {
        name: offer.name.clone(),
        dates,
        prices,
    }
}

/// Decides what to do with one offer.
///
/// `existed_in_index_before` reflects presence in the snapshot store;
/// `prior_snapshot` is the stored projection when it could be read. A
/// missing or unreadable snapshot for an offer that existed before is
/// treated as changed, so the index gets refreshed rather than drift.
pub fn evaluate(
    offer: &Offer,
    existed_in_index_before: bool,
    prior_snapshot: Option<&OfferSnapshot>,
    is_provider_triggered: bool,
) -> Decision {
    if !offer.is_eligible_for_search {
        if existed_in_index_before {
            return Decision::Remove;
        }
        return Decision::Skip;
    }

    if !is_provider_triggered {
        if existed_in_index_before {
            return Decision::Update;
        }
        return Decision::Add;
    }

    if !existed_in_index_before {
        return Decision::Add;
    }

    match prior_snapshot {
        Some(prior) if *prior == project(offer) => Decision::Skip,
        _ => Decision::Update,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Stock;
    use bigdecimal::BigDecimal;
    use chrono::{TimeZone, Utc};
    use std::str::FromStr;

    fn price(value: &str) -> BigDecimal {
        BigDecimal::from_str(value).expect("valid decimal")
    }

    fn stock(value: &str) -> Stock {
        Stock {
            price: price(value),
            beginning_datetime: None,
        }
    }

    fn event_stock(value: &str, timestamp: i64) -> Stock {
        Stock {
            price: price(value),
            beginning_datetime: Some(Utc.timestamp_opt(timestamp, 0).unwrap()),
        }
    }

    fn eligible_offer() -> Offer {
        Offer::new(1, "Concert ticket", 42)
            .with_eligibility(true)
            .with_stocks(vec![stock("10.00"), stock("25.50")])
    }

    fn ineligible_offer() -> Offer {
        Offer::new(1, "Concert ticket", 42).with_eligibility(false)
    }

    #[test]
    fn test_ineligible_and_indexed_is_removed() {
        let offer = ineligible_offer();
        assert_eq!(evaluate(&offer, true, None, false), Decision::Remove);
        assert_eq!(evaluate(&offer, true, None, true), Decision::Remove);
    }

    #[test]
    fn test_ineligible_and_absent_is_skipped() {
        let offer = ineligible_offer();
        assert_eq!(evaluate(&offer, false, None, false), Decision::Skip);
        assert_eq!(evaluate(&offer, false, None, true), Decision::Skip);
    }

    #[test]
    fn test_manual_paths_always_refresh() {
        let offer = eligible_offer();
        let unchanged = project(&offer);

        assert_eq!(evaluate(&offer, false, None, false), Decision::Add);
        // Even an identical snapshot does not short-circuit a manual refresh.
        assert_eq!(
            evaluate(&offer, true, Some(&unchanged), false),
            Decision::Update
        );
    }

    #[test]
    fn test_provider_first_sighting_is_added() {
        let offer = eligible_offer();
        assert_eq!(evaluate(&offer, false, None, true), Decision::Add);
    }

    #[test]
    fn test_provider_unchanged_is_skipped() {
        let offer = eligible_offer();
        let prior = project(&offer);
        assert_eq!(evaluate(&offer, true, Some(&prior), true), Decision::Skip);
    }

    #[test]
    fn test_provider_changed_name_is_updated() {
        let offer = eligible_offer();
        let mut prior = project(&offer);
        prior.name = "Old name".to_string();
        assert_eq!(evaluate(&offer, true, Some(&prior), true), Decision::Update);
    }

    #[test]
    fn test_provider_changed_price_is_updated() {
        let offer = eligible_offer();
        let mut prior = project(&offer);
        prior.prices[0] = price("9.99");
        assert_eq!(evaluate(&offer, true, Some(&prior), true), Decision::Update);
    }

    #[test]
    fn test_provider_price_comparison_is_numeric() {
        let offer = eligible_offer();
        let mut prior = project(&offer);
        // 10.0 and 10.00 are the same value; trailing zeros must not force a write.
        prior.prices[0] = price("10.0");
        assert_eq!(evaluate(&offer, true, Some(&prior), true), Decision::Skip);
    }

    #[test]
    fn test_provider_missing_snapshot_forces_update() {
        let offer = eligible_offer();
        assert_eq!(evaluate(&offer, true, None, true), Decision::Update);
    }

    #[test]
    fn test_projection_sorts_prices_and_keeps_duplicates() {
        let offer = Offer::new(7, "Poster", 42)
            .with_eligibility(true)
            .with_stocks(vec![stock("30.00"), stock("10.00"), stock("10.00")]);

        let projection = project(&offer);
        assert_eq!(
            projection.prices,
            vec![price("10.00"), price("10.00"), price("30.00")]
        );
        assert!(projection.dates.is_empty());
    }

    #[test]
    fn test_projection_event_dates_sorted_seconds() {
        let offer = Offer::new(7, "Play", 42)
            .with_eligibility(true)
            .with_event(true)
            .with_stocks(vec![
                event_stock("15.00", 1_700_000_600),
                event_stock("15.00", 1_700_000_000),
            ]);

        let projection = project(&offer);
        assert_eq!(projection.dates, vec![1_700_000_000, 1_700_000_600]);
    }

    #[test]
    fn test_projection_ignores_dates_for_non_events() {
        let offer = Offer::new(7, "Book", 42)
            .with_eligibility(true)
            .with_event(false)
            .with_stocks(vec![event_stock("15.00", 1_700_000_000)]);

        let projection = project(&offer);
        assert!(projection.dates.is_empty());
    }

    #[test]
    fn test_projection_added_date_is_a_change() {
        let offer = Offer::new(7, "Play", 42)
            .with_eligibility(true)
            .with_event(true)
            .with_stocks(vec![event_stock("15.00", 1_700_000_000)]);
        let prior = project(&offer);

        let grown = offer.clone().with_stocks(vec![
            event_stock("15.00", 1_700_000_000),
            event_stock("15.00", 1_700_090_000),
        ]);
        assert_eq!(evaluate(&grown, true, Some(&prior), true), Decision::Update);
    }

    #[test]
    fn test_decision_display_and_upsert() {
        assert_eq!(Decision::Add.to_string(), "add");
        assert_eq!(Decision::Remove.to_string(), "remove");
        assert!(Decision::Add.is_upsert());
        assert!(Decision::Update.is_upsert());
        assert!(!Decision::Remove.is_upsert());
        assert!(!Decision::Skip.is_upsert());
    }
}
