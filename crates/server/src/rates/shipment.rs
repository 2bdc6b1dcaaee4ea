//! Checkout callback parsing and shipment aggregation.
//!
//! Shopify's carrier-service payload is loosely typed in practice: ids arrive
//! as numbers or strings, `items` has been seen as an array, a single object
//! and `{ "item": ... }`. Parsing is deliberately tolerant; only a missing
//! country or an empty cart is rejected.

use carrier_rates_core::{
    AdjustedDimensions, Country, CurrencyCode, Destination, ProductId, VariantId,
    adjust_dimensions, resolve_country,
};
use serde_json::Value;

use super::QuoteError;
use super::filter::FilterContext;
use crate::catalog::ProductFacts;
use crate::freight::CarriageQuery;

/// Item-name fragments that mark a clothing cart.
const CLOTHING_MARKERS: &[&str] = &["clothing", "clothes", "apparel", "garment", "wear"];

/// Item-name fragments that mark a cart containing batteries.
const BATTERY_MARKERS: &[&str] = &["battery", "batteries", "battries", "power bank", "powerbank"];

/// Per-unit weight assumed for a cart with no weight at all.
const FALLBACK_UNIT_WEIGHT_KG: f64 = 0.1;

/// One cart line from checkout.
#[derive(Debug, Clone, PartialEq)]
pub struct LineItem {
    /// Product id, or the variant id when checkout sent no product id.
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub quantity: u32,
    /// Unit weight in grams as reported by checkout.
    pub grams: f64,
    pub name: String,
}

/// A parsed carrier-service callback.
#[derive(Debug, Clone, PartialEq)]
pub struct RateRequest {
    pub destination: Destination,
    pub line_items: Vec<LineItem>,
    pub currency: CurrencyCode,
}

impl RateRequest {
    /// Parse a callback body. Accepts the payload with or without the `rate` wrapper.
    ///
    /// # Errors
    ///
    /// Returns `QuoteError::Validation` if the body is not JSON, has no usable
    /// destination country, or has no usable line items.
    pub fn parse(body: &[u8]) -> Result<Self, QuoteError> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| QuoteError::Validation(format!("malformed JSON: {e}")))?;
        let rate = value.get("rate").unwrap_or(&value);

        let destination = rate
            .get("destination")
            .map(parse_destination)
            .unwrap_or_default();
        if !destination.has_country() {
            return Err(QuoteError::Validation(
                "destination country code missing".to_string(),
            ));
        }

        let line_items = rate.get("items").map(parse_items).unwrap_or_default();
        if line_items.is_empty() {
            return Err(QuoteError::Validation("no line items".to_string()));
        }

        let mut currency = rate
            .get("currency")
            .and_then(Value::as_str)
            .map(CurrencyCode::from_code)
            .unwrap_or_default();
        // UK checkouts report USD when the shop's base currency is USD
        if destination.country_code == "GB" && currency == CurrencyCode::USD {
            currency = CurrencyCode::GBP;
        }

        Ok(Self {
            destination,
            line_items,
            currency,
        })
    }
}

fn parse_destination(value: &Value) -> Destination {
    let field = |key: &str| value.get(key).and_then(Value::as_str).unwrap_or_default();

    let country_code = Some(field("country_code"))
        .filter(|code| !code.trim().is_empty())
        .unwrap_or_else(|| field("country"));
    let province_code = Some(field("province_code"))
        .filter(|code| !code.trim().is_empty())
        .unwrap_or_else(|| field("province"));
    let province = Some(field("province_name"))
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| field("province"));

    Destination::new(
        country_code,
        province,
        province_code,
        field("postal_code"),
        field("address1"),
    )
}

fn parse_items(value: &Value) -> Vec<LineItem> {
    match value {
        Value::Array(items) => items.iter().filter_map(parse_item).collect(),
        Value::Object(map) => match map.get("item") {
            Some(inner) => parse_items(inner),
            None => parse_item(value).into_iter().collect(),
        },
        _ => Vec::new(),
    }
}

fn parse_item(value: &Value) -> Option<LineItem> {
    let variant_id = value.get("variant_id").and_then(lenient_i64).map(VariantId::new);
    let product_id = value
        .get("product_id")
        .and_then(lenient_i64)
        .map(ProductId::new)
        .or_else(|| variant_id.map(|id| ProductId::new(id.as_i64())))?;

    let quantity = value
        .get("quantity")
        .and_then(lenient_i64)
        .and_then(|q| u32::try_from(q).ok())
        .filter(|q| *q > 0)
        .unwrap_or(1);

    let grams = value
        .get("grams")
        .and_then(lenient_f64)
        .filter(|g| g.is_finite() && *g > 0.0)
        .unwrap_or(0.0);

    let name = value
        .get("name")
        .or_else(|| value.get("title"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Some(LineItem {
        product_id,
        variant_id,
        quantity,
        grams,
        name,
    })
}

fn lenient_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|id| *id > 0)
}

fn lenient_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// =============================================================================
// Shipment
// =============================================================================

/// A cart line with its product facts resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ShipmentItem {
    pub line: LineItem,
    pub facts: ProductFacts,
    /// Weight of the whole line (unit weight x quantity).
    pub weight_kg: f64,
}

impl ShipmentItem {
    fn new(line: LineItem, facts: ProductFacts) -> Self {
        let unit_kg = if line.grams > 0.0 {
            line.grams / 1000.0
        } else {
            facts.weight_kg.filter(|w| w.is_finite() && *w > 0.0).unwrap_or(0.0)
        };
        let weight_kg = unit_kg * f64::from(line.quantity);

        Self {
            line,
            facts,
            weight_kg,
        }
    }

    /// Packed parcel for shipping this line on its own. Sides the catalog
    /// does not know come from the consolidated cart.
    #[must_use]
    pub fn parcel(
        &self,
        cart_height_mm: Option<f64>,
        cart_diameter_mm: Option<f64>,
    ) -> AdjustedDimensions {
        adjust_dimensions(
            Some(self.weight_kg),
            self.facts.height_mm.or(cart_height_mm),
            self.facts.diameter_mm.or(cart_diameter_mm),
        )
    }
}

/// Everything needed to quote one cart.
#[derive(Debug, Clone, PartialEq)]
pub struct Shipment {
    pub shop: String,
    pub destination: Destination,
    pub country: Country,
    pub currency: CurrencyCode,
    pub items: Vec<ShipmentItem>,
    pub total_quantity: u32,
    /// Sum of line weights before packing.
    pub weight_kg: f64,
    /// Tallest product in the cart.
    pub height_mm: Option<f64>,
    /// Widest product in the cart.
    pub diameter_mm: Option<f64>,
    /// Packed consolidated parcel.
    pub parcel: AdjustedDimensions,
    pub is_clothing: bool,
    pub is_battery: bool,
}

impl Shipment {
    /// Combine a request with the facts found for each line (same order).
    ///
    /// Lines without facts use defaults.
    #[must_use]
    pub fn new(shop: &str, request: RateRequest, facts: Vec<Option<ProductFacts>>) -> Self {
        let mut facts = facts.into_iter();
        let items: Vec<ShipmentItem> = request
            .line_items
            .into_iter()
            .map(|line| ShipmentItem::new(line, facts.next().flatten().unwrap_or_default()))
            .collect();

        let total_quantity: u32 = items.iter().map(|item| item.line.quantity).sum();
        let mut weight_kg: f64 = items.iter().map(|item| item.weight_kg).sum();
        if weight_kg <= 0.0 {
            weight_kg = FALLBACK_UNIT_WEIGHT_KG * f64::from(total_quantity.max(1));
        }

        let height_mm = max_fact(&items, |facts| facts.height_mm);
        let diameter_mm = max_fact(&items, |facts| facts.diameter_mm);
        let parcel = adjust_dimensions(Some(weight_kg), height_mm, diameter_mm);

        let names: Vec<String> = items.iter().map(|item| item.line.name.to_lowercase()).collect();
        let mentions =
            |markers: &[&str]| names.iter().any(|name| markers.iter().any(|m| name.contains(m)));

        Self {
            shop: shop.to_string(),
            country: resolve_country(&request.destination.country_code),
            destination: request.destination,
            currency: request.currency,
            is_clothing: mentions(CLOTHING_MARKERS),
            is_battery: mentions(BATTERY_MARKERS),
            items,
            total_quantity,
            weight_kg,
            height_mm,
            diameter_mm,
            parcel,
        }
    }

    /// Aggregator query for shipping the whole cart as one consignment.
    #[must_use]
    pub fn consolidated_query(&self) -> CarriageQuery {
        CarriageQuery::new(
            &self.country,
            &self.destination,
            self.parcel,
            self.total_quantity,
        )
    }

    /// Aggregator query for one line shipped on its own.
    #[must_use]
    pub fn item_query(&self, item: &ShipmentItem) -> CarriageQuery {
        CarriageQuery::new(
            &self.country,
            &self.destination,
            self.item_parcel(item),
            item.line.quantity,
        )
    }

    /// Filter context for the consolidated parcel.
    #[must_use]
    pub fn filter_context(&self) -> FilterContext {
        self.filter_context_for(self.parcel.weight_kg)
    }

    /// Filter context for one line's parcel.
    #[must_use]
    pub fn item_filter_context(&self, item: &ShipmentItem) -> FilterContext {
        self.filter_context_for(self.item_parcel(item).weight_kg)
    }

    /// Packed parcel for one line shipped on its own.
    #[must_use]
    pub fn item_parcel(&self, item: &ShipmentItem) -> AdjustedDimensions {
        item.parcel(self.height_mm, self.diameter_mm)
    }

    fn filter_context_for(&self, weight_kg: f64) -> FilterContext {
        FilterContext {
            country_code: self.country.code.clone(),
            weight_kg,
            currency: self.currency,
            is_clothing: self.is_clothing,
            is_battery: self.is_battery,
        }
    }
}

fn max_fact(items: &[ShipmentItem], fact: impl Fn(&ProductFacts) -> Option<f64>) -> Option<f64> {
    items
        .iter()
        .filter_map(|item| fact(&item.facts))
        .filter(|v| v.is_finite() && *v > 0.0)
        .reduce(f64::max)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: &Value) -> Result<RateRequest, QuoteError> {
        RateRequest::parse(value.to_string().as_bytes())
    }

    fn shopify_payload() -> Value {
        json!({
            "rate": {
                "origin": {"country": "CN", "postal_code": "518000"},
                "destination": {
                    "country": "AU",
                    "postal_code": "3000",
                    "province": "VIC",
                    "city": "Melbourne",
                    "address1": "1 Collins St"
                },
                "items": [
                    {"name": "Ceramic Vase", "product_id": 7_504_138_731_625_i64,
                     "variant_id": 42_000_000_001_i64, "quantity": 1, "grams": 480}
                ],
                "currency": "AUD"
            }
        })
    }

    #[test]
    fn test_parse_shopify_payload() {
        let request = parse(&shopify_payload()).unwrap();

        assert_eq!(request.destination.country_code, "AU");
        assert_eq!(request.destination.province_code, "VIC");
        assert_eq!(request.destination.postal_code, "3000");
        assert_eq!(request.currency, CurrencyCode::AUD);
        assert_eq!(request.line_items.len(), 1);
        assert_eq!(request.line_items[0].product_id, ProductId::new(7_504_138_731_625));
        assert!((request.line_items[0].grams - 480.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_without_rate_wrapper_and_string_ids() {
        let request = parse(&json!({
            "destination": {"country_code": "nz", "postal_code": "1010"},
            "items": {"item": {"variant_id": "9001", "quantity": "3", "grams": "250"}}
        }))
        .unwrap();

        assert_eq!(request.destination.country_code, "NZ");
        let item = &request.line_items[0];
        assert_eq!(item.product_id, ProductId::new(9001));
        assert_eq!(item.variant_id, Some(VariantId::new(9001)));
        assert_eq!(item.quantity, 3);
    }

    #[test]
    fn test_parse_single_item_object() {
        let request = parse(&json!({
            "destination": {"country": "US"},
            "items": {"product_id": 5, "quantity": 2}
        }))
        .unwrap();
        assert_eq!(request.line_items.len(), 1);
        assert_eq!(request.line_items[0].quantity, 2);
    }

    #[test]
    fn test_items_without_ids_are_skipped() {
        let result = parse(&json!({
            "destination": {"country": "AU"},
            "items": [{"name": "Mystery", "quantity": 1, "grams": 100}]
        }));
        assert!(matches!(result, Err(QuoteError::Validation(_))));
    }

    #[test]
    fn test_missing_country_rejected() {
        let mut payload = shopify_payload();
        payload["rate"]["destination"]["country"] = json!(null);
        assert!(matches!(parse(&payload), Err(QuoteError::Validation(_))));

        assert!(matches!(
            RateRequest::parse(b"not json"),
            Err(QuoteError::Validation(_))
        ));
    }

    #[test]
    fn test_gb_usd_checkout_buckets_as_gbp() {
        let request = parse(&json!({
            "destination": {"country": "GB"},
            "items": [{"product_id": 1}],
            "currency": "USD"
        }))
        .unwrap();
        assert_eq!(request.currency, CurrencyCode::GBP);
    }

    #[test]
    fn test_missing_currency_defaults_to_aud() {
        let request = parse(&json!({
            "destination": {"country": "AU"},
            "items": [{"product_id": 1}]
        }))
        .unwrap();
        assert_eq!(request.currency, CurrencyCode::AUD);
    }

    #[test]
    fn test_single_480g_item_to_melbourne() {
        let request = parse(&shopify_payload()).unwrap();
        let shipment = Shipment::new("shop.myshopify.com", request, vec![None]);

        assert!((shipment.weight_kg - 0.48).abs() < 1e-9);
        assert!((shipment.parcel.weight_kg - 0.68).abs() < 1e-9);
        assert!((shipment.parcel.height_cm - 12.0).abs() < 1e-9);
        assert_eq!(shipment.total_quantity, 1);
        assert_eq!(shipment.country.name, "Australia");
        assert!(!shipment.is_clothing);
    }

    #[test]
    fn test_combined_shipment_sums_weight_and_takes_max_dimensions() {
        let request = parse(&json!({
            "destination": {"country": "AU"},
            "items": [
                {"product_id": 1, "quantity": 2, "grams": 300, "name": "Linen Shirt (Menswear)"},
                {"product_id": 2, "quantity": 1, "grams": 0, "name": "Lamp"}
            ]
        }))
        .unwrap();
        let facts = vec![
            Some(ProductFacts { weight_kg: None, height_mm: Some(50.0), diameter_mm: Some(300.0) }),
            Some(ProductFacts { weight_kg: Some(1.2), height_mm: Some(400.0), diameter_mm: None }),
        ];
        let shipment = Shipment::new("shop", request, facts);

        // 2 x 0.3 kg from checkout grams + 1.2 kg from the catalog
        assert!((shipment.weight_kg - 1.8).abs() < 1e-9);
        assert_eq!(shipment.height_mm, Some(400.0));
        assert_eq!(shipment.diameter_mm, Some(300.0));
        assert_eq!(shipment.total_quantity, 3);
        assert!(shipment.is_clothing);

        let query = shipment.consolidated_query();
        assert_eq!(query.product_list[0].count, 3);
        assert!((query.product_list[0].height - 42.0).abs() < 1e-9);

        let item_query = shipment.item_query(&shipment.items[0]);
        assert_eq!(item_query.product_list[0].count, 2);
        assert!((item_query.product_list[0].weight - 0.8).abs() < 1e-9);
        assert!((item_query.product_list[0].height - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_item_parcel_borrows_unknown_sides_from_cart() {
        let request = parse(&json!({
            "destination": {"country": "AU"},
            "items": [
                {"product_id": 1, "grams": 200, "name": "Vase"},
                {"product_id": 2, "grams": 500, "name": "Rug"},
                {"product_id": 3, "grams": 100, "name": "Card"}
            ]
        }))
        .unwrap();
        let facts = vec![
            Some(ProductFacts { weight_kg: None, height_mm: Some(250.0), diameter_mm: None }),
            Some(ProductFacts { weight_kg: None, height_mm: None, diameter_mm: Some(600.0) }),
            None,
        ];
        let shipment = Shipment::new("shop", request, facts);

        let vase = shipment.item_parcel(&shipment.items[0]);
        assert!((vase.height_cm - 27.0).abs() < 1e-9);
        assert!((vase.diameter_cm - 62.0).abs() < 1e-9);

        let card = shipment.item_query(&shipment.items[2]);
        assert!((card.product_list[0].height - 27.0).abs() < 1e-9);
        assert!((card.product_list[0].length - 62.0).abs() < 1e-9);
    }

    #[test]
    fn test_weightless_cart_uses_fallback_per_unit() {
        let request = parse(&json!({
            "destination": {"country": "AU"},
            "items": [{"product_id": 1, "quantity": 4}]
        }))
        .unwrap();
        let shipment = Shipment::new("shop", request, vec![None]);
        assert!((shipment.weight_kg - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_battery_cart_flag() {
        let request = parse(&json!({
            "destination": {"country": "PH"},
            "items": [{"product_id": 1, "name": "20000mAh Power Bank"}]
        }))
        .unwrap();
        let shipment = Shipment::new("shop", request, vec![None]);
        assert!(shipment.is_battery);
        assert!(shipment.filter_context().is_battery);
        assert_eq!(shipment.filter_context().country_code, "PH");
    }
}
