//! Wire types for the channel-carriage-list endpoint.

use std::str::FromStr;

use carrier_rates_core::{
    AdjustedDimensions, CarrierFamily, Country, Destination, Price, RouteQuote,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

/// Records requested per page. Routes beyond this are never seen.
pub const PAGE_SIZE: u32 = 50;

/// Transit days assumed when the aggregator omits them.
pub const DEFAULT_MIN_DAYS: u32 = 5;
pub const DEFAULT_MAX_DAYS: u32 = 15;

/// Query item sent inside the page envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CarriageQuery {
    pub lang: String,
    /// Carrier spelling of the country name.
    pub country: String,
    pub country_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub province: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub province_code: Option<String>,
    pub detail_address: String,
    pub post_code: String,
    pub product_list: Vec<ParcelLine>,
    pub order_by: String,
    pub order_type: String,
}

/// One packed parcel line. The diameter is sent as both length and width.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParcelLine {
    pub length: f64,
    pub width: f64,
    pub height: f64,
    pub weight: f64,
    pub count: u32,
    pub category_code: String,
}

impl CarriageQuery {
    /// Build a cheapest-first query for `count` parcels of the given size.
    #[must_use]
    pub fn new(
        country: &Country,
        destination: &Destination,
        parcel: AdjustedDimensions,
        count: u32,
    ) -> Self {
        let (province, province_code) = if country.omits_province() {
            (None, None)
        } else {
            (
                Some(destination.province.clone()),
                Some(destination.province_code.clone()),
            )
        };

        Self {
            lang: "en".to_string(),
            country: country.carrier_name.clone(),
            country_code: country.code.clone(),
            province,
            province_code,
            detail_address: destination.address1.clone(),
            post_code: destination.postal_code.clone(),
            product_list: vec![ParcelLine {
                length: parcel.diameter_cm,
                width: parcel.diameter_cm,
                height: parcel.height_cm,
                weight: parcel.weight_kg,
                count: count.max(1),
                category_code: "other".to_string(),
            }],
            order_by: "price".to_string(),
            order_type: "asc".to_string(),
        }
    }
}

/// Pagination envelope wrapping every query.
#[derive(Debug, Serialize)]
pub struct CarriageEnvelope<'a> {
    pub size: u32,
    pub current: u32,
    pub item: &'a CarriageQuery,
}

impl<'a> CarriageEnvelope<'a> {
    #[must_use]
    pub const fn first_page(item: &'a CarriageQuery) -> Self {
        Self {
            size: PAGE_SIZE,
            current: 1,
            item,
        }
    }
}

/// Top-level response.
#[derive(Debug, Deserialize)]
pub struct CarriageResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub code: Option<Value>,
    #[serde(default)]
    pub info: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

impl CarriageResponse {
    /// Route records, wherever this API version put them.
    ///
    /// Records that cannot be read are skipped one by one so the rest of the
    /// list can still be offered.
    #[must_use]
    pub fn into_records(self) -> Vec<CarriageRecord> {
        let Some(data) = self.data else {
            return Vec::new();
        };

        let list = match data {
            Value::Array(list) => list,
            mut data => ["records", "list", "items"]
                .iter()
                .find_map(|key| match data.get_mut(*key).map(Value::take) {
                    Some(Value::Array(list)) => Some(list),
                    _ => None,
                })
                .unwrap_or_default(),
        };

        list.into_iter()
            .filter_map(|record| {
                serde_json::from_value(record)
                    .inspect_err(|e| warn!(error = %e, "Skipping unreadable aggregator record"))
                    .ok()
            })
            .collect()
    }

    /// Upstream error code as text (the API mixes numbers and strings).
    #[must_use]
    pub fn code_text(&self) -> String {
        match &self.code {
            Some(Value::String(code)) => code.clone(),
            Some(Value::Null) | None => "unknown".to_string(),
            Some(other) => other.to_string(),
        }
    }
}

/// One logistics channel as returned by the aggregator.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarriageRecord {
    #[serde(default)]
    pub service_name: String,
    #[serde(default)]
    pub service_code: Option<String>,
    #[serde(default)]
    pub channel_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_price")]
    pub total_price: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_days")]
    pub min_time_in_transit: Option<u32>,
    #[serde(default, deserialize_with = "lenient_days")]
    pub max_time_in_transit: Option<u32>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub weight_low_limit: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub weight_high_limit: Option<f64>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub available: Option<bool>,
}

/// Prices arrive as JSON numbers or decimal strings depending on the channel.
fn lenient_price<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Decimal>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n
            .as_f64()
            .and_then(|f| Price::cny_from_f64(f).ok())
            .map(|price| price.amount),
        Some(Value::String(s)) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    })
}

/// Finite number from a JSON number or numeric string.
fn number_value(value: Option<Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

fn lenient_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(number_value(Option::<Value>::deserialize(deserializer)?))
}

/// Transit days as integers, floats or strings. Zero and negative counts
/// are treated as missing so the defaults apply.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn lenient_days<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    Ok(number_value(Option::<Value>::deserialize(deserializer)?)
        .map(f64::ceil)
        .filter(|days| *days >= 1.0 && *days <= f64::from(u32::MAX))
        .map(|days| days as u32))
}

fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Bool(b)) => Some(b),
        Some(Value::Number(n)) => n.as_f64().map(|n| n.abs() > f64::EPSILON),
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    })
}

impl CarriageRecord {
    /// Convert to a route. Records without a price cannot be offered.
    #[must_use]
    pub fn into_route(self) -> Option<RouteQuote> {
        let price = self.total_price?;
        let min_days = self.min_time_in_transit.unwrap_or(DEFAULT_MIN_DAYS);
        let max_days = self.max_time_in_transit.unwrap_or(DEFAULT_MAX_DAYS).max(min_days);

        Some(RouteQuote {
            carrier: CarrierFamily::classify(&self.service_name),
            service_code: self
                .service_code
                .or(self.channel_code)
                .unwrap_or_default(),
            service_name: self.service_name,
            price,
            min_days,
            max_days,
            weight_low_limit_kg: self.weight_low_limit.unwrap_or(0.0),
            weight_high_limit_kg: self.weight_high_limit.unwrap_or(f64::MAX),
            available: self.available.unwrap_or(true),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use carrier_rates_core::{adjust_dimensions, resolve_country};
    use serde_json::json;

    fn destination(code: &str) -> Destination {
        Destination::new(code, "Victoria", "VIC", "3000", "1 Collins St")
    }

    #[test]
    fn test_query_serializes_in_camel_case() {
        let parcel = adjust_dimensions(Some(0.48), None, None);
        let query = CarriageQuery::new(&resolve_country("AU"), &destination("AU"), parcel, 2);
        let value = serde_json::to_value(&query).unwrap();

        assert_eq!(value["country"], "Australia");
        assert_eq!(value["countryCode"], "AU");
        assert_eq!(value["province"], "Victoria");
        assert_eq!(value["provinceCode"], "VIC");
        assert_eq!(value["postCode"], "3000");
        assert_eq!(value["detailAddress"], "1 Collins St");
        assert_eq!(value["orderBy"], "price");
        assert_eq!(value["orderType"], "asc");
        assert_eq!(value["productList"][0]["weight"], 0.68);
        assert_eq!(value["productList"][0]["length"], 12.0);
        assert_eq!(value["productList"][0]["count"], 2);
        assert_eq!(value["productList"][0]["categoryCode"], "other");
    }

    #[test]
    fn test_singapore_omits_province() {
        let parcel = adjust_dimensions(None, None, None);
        let query = CarriageQuery::new(&resolve_country("SG"), &destination("SG"), parcel, 1);
        let value = serde_json::to_value(&query).unwrap();

        assert!(value.get("province").is_none());
        assert!(value.get("provinceCode").is_none());
        assert_eq!(value["country"], "Singapore");
    }

    #[test]
    fn test_united_states_uses_carrier_spelling() {
        let parcel = adjust_dimensions(None, None, None);
        let query = CarriageQuery::new(&resolve_country("US"), &destination("US"), parcel, 1);
        assert_eq!(query.country, "USA");
        assert_eq!(query.country_code, "US");
    }

    #[test]
    fn test_envelope_field_order_is_stable() {
        let parcel = adjust_dimensions(None, None, None);
        let query = CarriageQuery::new(&resolve_country("NZ"), &destination("NZ"), parcel, 1);
        let body = serde_json::to_string(&CarriageEnvelope::first_page(&query)).unwrap();
        assert!(body.starts_with(r#"{"size":50,"current":1,"item":{"lang":"en","country":"New Zealand""#));
    }

    #[test]
    fn test_records_fallback_locations() {
        for data in [
            json!({"records": [{"serviceName": "A", "totalPrice": 10}]}),
            json!({"list": [{"serviceName": "A", "totalPrice": 10}]}),
            json!({"items": [{"serviceName": "A", "totalPrice": 10}]}),
            json!([{"serviceName": "A", "totalPrice": 10}]),
        ] {
            let response = CarriageResponse {
                success: true,
                code: None,
                info: None,
                data: Some(data),
            };
            assert_eq!(response.into_records().len(), 1);
        }
    }

    #[test]
    fn test_float_prices_lose_binary_noise() {
        let record: CarriageRecord =
            serde_json::from_value(json!({"serviceName": "A", "totalPrice": 260.04})).unwrap();
        let price = record.total_price.unwrap();
        assert_eq!(price, Decimal::new(26_004, 2));

        let unpriced: CarriageRecord =
            serde_json::from_value(json!({"serviceName": "A", "totalPrice": "n/a"})).unwrap();
        assert_eq!(unpriced.total_price, None);
    }

    #[test]
    fn test_record_defaults() {
        let record: CarriageRecord = serde_json::from_value(json!({
            "serviceName": "DHL Express",
            "channelCode": "DHL01",
            "totalPrice": "152.30"
        }))
        .unwrap();
        let route = record.into_route().unwrap();

        assert_eq!(route.carrier, CarrierFamily::Dhl);
        assert_eq!(route.service_code, "DHL01");
        assert_eq!(route.price, Decimal::new(15230, 2));
        assert_eq!((route.min_days, route.max_days), (5, 15));
        assert!(route.available);
        assert!(route.accepts_weight(30.0));
    }

    #[test]
    fn test_record_without_price_is_skipped() {
        let record: CarriageRecord =
            serde_json::from_value(json!({"serviceName": "ePacket", "available": true})).unwrap();
        assert!(record.into_route().is_none());
    }

    #[test]
    fn test_code_text() {
        let response: CarriageResponse =
            serde_json::from_value(json!({"success": false, "code": 10003, "info": "sign error"}))
                .unwrap();
        assert_eq!(response.code_text(), "10003");
    }

    #[test]
    fn test_odd_record_fields_keep_the_list() {
        let response = CarriageResponse {
            success: true,
            code: None,
            info: None,
            data: Some(json!({"records": [
                {"serviceName": "Standard Line", "totalPrice": 45.5,
                 "minTimeInTransit": 7, "maxTimeInTransit": 12, "available": true},
                {"serviceName": "Tracked Line", "totalPrice": "61.20",
                 "minTimeInTransit": "8", "maxTimeInTransit": 14.0,
                 "weightHighLimit": "2.5", "available": "true"},
                {"serviceName": ["not", "a", "name"], "totalPrice": 30}
            ]})),
        };

        let routes: Vec<RouteQuote> = response
            .into_records()
            .into_iter()
            .filter_map(CarriageRecord::into_route)
            .collect();

        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].service_name, "Standard Line");
        assert_eq!((routes[1].min_days, routes[1].max_days), (8, 14));
        assert!(routes[1].available);
        assert!(routes[1].accepts_weight(2.0));
        assert!(!routes[1].accepts_weight(3.0));
    }

    #[test]
    fn test_zero_transit_days_use_defaults() {
        let record: CarriageRecord = serde_json::from_value(json!({
            "serviceName": "Economy", "totalPrice": 20,
            "minTimeInTransit": 0, "maxTimeInTransit": "0", "available": "no"
        }))
        .unwrap();
        assert_eq!(record.min_time_in_transit, None);

        let route = record.into_route().unwrap();
        assert_eq!((route.min_days, route.max_days), (DEFAULT_MIN_DAYS, DEFAULT_MAX_DAYS));
        assert!(!route.available);
    }
}
