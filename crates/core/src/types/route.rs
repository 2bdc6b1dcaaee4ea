//! Shipping routes quoted by the freight aggregator.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Carrier family a route belongs to.
///
/// Premium families (UPS, DHL, FedEx) are never removed by deduplication.
/// Aramex and EMS are collapsed to their single cheapest route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CarrierFamily {
    Ups,
    Dhl,
    Fedex,
    Aramex,
    Ems,
    Other,
}

/// Upper-cased name fragments, checked in order. First match wins.
const CARRIER_PATTERNS: &[(&str, CarrierFamily)] = &[
    ("UPS", CarrierFamily::Ups),
    ("DHL", CarrierFamily::Dhl),
    ("FEDEX", CarrierFamily::Fedex),
    ("ARAMEX", CarrierFamily::Aramex),
    ("EMS", CarrierFamily::Ems),
];

impl CarrierFamily {
    /// Classify a route by its service name.
    #[must_use]
    pub fn classify(service_name: &str) -> Self {
        let upper = service_name.to_ascii_uppercase();
        CARRIER_PATTERNS
            .iter()
            .find(|(pattern, _)| upper.contains(pattern))
            .map_or(Self::Other, |(_, family)| *family)
    }

    #[must_use]
    pub const fn is_premium(&self) -> bool {
        matches!(self, Self::Ups | Self::Dhl | Self::Fedex)
    }

    /// Families where only the cheapest route is offered.
    #[must_use]
    pub const fn keeps_cheapest_only(&self) -> bool {
        matches!(self, Self::Aramex | Self::Ems)
    }
}

/// One route offered by the aggregator for a shipment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteQuote {
    pub service_name: String,
    pub service_code: String,
    /// Price in CNY.
    pub price: Decimal,
    pub min_days: u32,
    pub max_days: u32,
    pub weight_low_limit_kg: f64,
    pub weight_high_limit_kg: f64,
    pub available: bool,
    pub carrier: CarrierFamily,
}

impl RouteQuote {
    #[must_use]
    pub const fn is_premium(&self) -> bool {
        self.carrier.is_premium()
    }

    /// Whether a parcel of this weight falls inside the route's band (inclusive).
    #[must_use]
    pub fn accepts_weight(&self, weight_kg: f64) -> bool {
        weight_kg >= self.weight_low_limit_kg && weight_kg <= self.weight_high_limit_kg
    }

    /// Ordering key for "faster" routes: later arrival first, then earlier
    /// start, then a tighter window.
    #[must_use]
    pub const fn delivery_rank(&self) -> (u32, u32, u32) {
        (
            self.max_days,
            self.min_days,
            self.max_days.saturating_sub(self.min_days),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(name: &str, min_days: u32, max_days: u32) -> RouteQuote {
        RouteQuote {
            service_name: name.to_string(),
            service_code: String::new(),
            price: Decimal::TEN,
            min_days,
            max_days,
            weight_low_limit_kg: 0.1,
            weight_high_limit_kg: 2.0,
            available: true,
            carrier: CarrierFamily::classify(name),
        }
    }

    #[test]
    fn test_classify_by_name_fragment() {
        assert_eq!(CarrierFamily::classify("UPS Saver"), CarrierFamily::Ups);
        assert_eq!(CarrierFamily::classify("dhl express"), CarrierFamily::Dhl);
        assert_eq!(CarrierFamily::classify("FedEx IP"), CarrierFamily::Fedex);
        assert_eq!(CarrierFamily::classify("Aramex Economy"), CarrierFamily::Aramex);
        assert_eq!(CarrierFamily::classify("China EMS"), CarrierFamily::Ems);
        assert_eq!(CarrierFamily::classify("ePacket"), CarrierFamily::Other);
    }

    #[test]
    fn test_classify_first_match_wins() {
        // Contains both "DHL" and "EMS"
        assert_eq!(
            CarrierFamily::classify("DHL eCommerce Systems"),
            CarrierFamily::Dhl
        );
    }

    #[test]
    fn test_premium_families() {
        assert!(CarrierFamily::Ups.is_premium());
        assert!(CarrierFamily::Dhl.is_premium());
        assert!(CarrierFamily::Fedex.is_premium());
        assert!(!CarrierFamily::Aramex.is_premium());
        assert!(CarrierFamily::Ems.keeps_cheapest_only());
        assert!(!CarrierFamily::Other.keeps_cheapest_only());
    }

    #[test]
    fn test_weight_band_is_inclusive() {
        let r = route("ePacket", 7, 12);
        assert!(r.accepts_weight(0.1));
        assert!(r.accepts_weight(2.0));
        assert!(!r.accepts_weight(2.001));
        assert!(!r.accepts_weight(0.05));
    }

    #[test]
    fn test_delivery_rank_prefers_earlier_arrival() {
        assert!(route("a", 3, 8).delivery_rank() < route("b", 2, 9).delivery_rank());
        assert!(route("a", 2, 8).delivery_rank() < route("b", 3, 8).delivery_rank());
    }
}
