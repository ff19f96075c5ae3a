//! Documents written to the offers index.
//!
//! Only the fields that drive re-index decisions are carried; ranking
//! and display attributes are owned by the host application's serializer
//! and are out of scope here. The `objectID` is always the externalized
//! offer id, never the raw database id.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use crate::catalog::Offer;
use crate::queue::OfferSnapshot;
use crate::utils::externalize;

/// One offer as stored in the search engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferDocument {
    #[serde(rename = "objectID")]
    pub object_id: String,
    pub name: String,
    /// Event start times as unix seconds, sorted.
    pub dates: Vec<i64>,
    /// One price per bookable stock, sorted.
    pub prices: Vec<BigDecimal>,
    pub venue_id: i64,
    pub is_event: bool,
}

impl OfferDocument {
    /// Builds the document for an offer from its current projection.
    ///
    /// Using the same projection that gets written to the snapshot store
    /// keeps the index and the change-detection cache in agreement.
    pub fn build(offer: &Offer, projection: &OfferSnapshot) -> Self {
        Self {
            object_id: externalize(offer.id),
            name: projection.name.clone(),
            dates: projection.dates.clone(),
            prices: projection.prices.clone(),
            venue_id: offer.venue_id,
            is_event: offer.is_event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn projection() -> OfferSnapshot {
        OfferSnapshot {
            name: "Concert".to_string(),
            dates: vec![1_603_098_000],
            prices: vec![BigDecimal::from_str("10.50").unwrap()],
        }
    }

    #[test]
    fn test_build_uses_externalized_id() {
        let offer = Offer::new(12345, "Concert", 7).with_event(true);
        let document = OfferDocument::build(&offer, &projection());

        assert_eq!(document.object_id, "GA4Q");
        assert_eq!(document.name, "Concert");
        assert_eq!(document.venue_id, 7);
        assert!(document.is_event);
    }

    #[test]
    fn test_serialized_field_names() {
        let offer = Offer::new(1, "Concert", 7).with_event(true);
        let value = serde_json::to_value(OfferDocument::build(&offer, &projection()))
            .expect("should serialize");

        assert!(value.get("objectID").is_some());
        assert!(value.get("venueId").is_some());
        assert!(value.get("isEvent").is_some());
        assert!(value.get("dates").is_some());
        assert!(value.get("prices").is_some());
        assert!(value.get("object_id").is_none());
    }

    #[test]
    fn test_document_carries_projection_values() {
        let offer = Offer::new(1, "Concert", 7);
        let projection = projection();
        let document = OfferDocument::build(&offer, &projection);

        assert_eq!(document.dates, projection.dates);
        assert_eq!(document.prices, projection.prices);
        assert_eq!(document.name, projection.name);
    }
}
