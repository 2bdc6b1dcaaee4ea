//! Shopify carrier-service callback.
//!
//! Checkout blocks on this endpoint, so it always answers `200` with a
//! `rates` array. Any failure is logged and answered with no rates, which
//! Shopify shows as "no shipping available" rather than an error page.

use axum::{
    Json,
    body::Bytes,
    extract::{RawQuery, State},
    http::{HeaderMap, HeaderName, header},
    response::{IntoResponse, Response},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use secrecy::ExposeSecret;
use serde::Serialize;
use sha2::Sha256;
use tracing::{instrument, warn};

use crate::rates::{QuoteOutcome, ShippingRate};
use crate::state::AppState;

/// Body signature header sent by Shopify.
pub const HMAC_HEADER: &str = "x-shopify-hmac-sha256";

/// Shop domain header sent by Shopify.
pub const SHOP_DOMAIN_HEADER: &str = "x-shopify-shop-domain";

#[derive(Serialize)]
struct RatesResponse<'a> {
    rates: &'a [ShippingRate],
}

/// POST /carrier-service?shop=<domain>
///
/// The body is read raw so that malformed payloads never trigger an
/// extractor rejection.
#[instrument(skip_all)]
pub async fn carrier_rates(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let shop = shop_domain(query.as_deref(), &headers);

    if let Some(secret) = state.shopify_api_secret() {
        let provided = headers.get(HMAC_HEADER).and_then(|v| v.to_str().ok());
        if !verify_body_hmac(&body, provided, secret.expose_secret()) {
            warn!(shop = %shop, "Carrier callback failed HMAC verification");
            return respond(&[], false);
        }
    }

    let QuoteOutcome { rates, cache_hit } = state.engine().quote(&shop, &body).await;
    respond(&rates, cache_hit)
}

fn respond(rates: &[ShippingRate], cache_hit: bool) -> Response {
    (
        [
            (header::CACHE_CONTROL, "no-store"),
            (HeaderName::from_static("x-cache"), if cache_hit { "HIT" } else { "MISS" }),
        ],
        Json(RatesResponse { rates }),
    )
        .into_response()
}

/// Shop from the `shop` query parameter, else Shopify's domain header.
fn shop_domain(query: Option<&str>, headers: &HeaderMap) -> String {
    query
        .and_then(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .find(|(key, _)| key == "shop")
                .map(|(_, value)| value.into_owned())
        })
        .or_else(|| {
            headers
                .get(SHOP_DOMAIN_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        })
        .map(|shop| shop.trim().to_ascii_lowercase())
        .filter(|shop| !shop.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

// =============================================================================
// HMAC Verification
// =============================================================================

type HmacSha256 = Hmac<Sha256>;

/// Check a base64 HMAC-SHA256 of the raw body against the app secret.
#[must_use]
pub fn verify_body_hmac(body: &[u8], provided: Option<&str>, secret: &str) -> bool {
    let Some(provided) = provided else {
        return false;
    };
    let Ok(expected) = STANDARD.decode(provided.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);

    // Constant-time comparison
    mac.verify_slice(&expected).is_ok()
}

/// Base64 HMAC-SHA256 of a body, as Shopify computes it.
#[must_use]
pub fn sign_body(body: &[u8], secret: &str) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(body);
    Some(STANDARD.encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_hmac_round_trip() {
        let body = br#"{"rate":{}}"#;
        let signature = sign_body(body, "shpss_secret").unwrap();

        assert!(verify_body_hmac(body, Some(&signature), "shpss_secret"));
        assert!(!verify_body_hmac(body, Some(&signature), "other_secret"));
        assert!(!verify_body_hmac(b"{}", Some(&signature), "shpss_secret"));
        assert!(!verify_body_hmac(body, Some("not base64!"), "shpss_secret"));
        assert!(!verify_body_hmac(body, None, "shpss_secret"));
    }

    #[test]
    fn test_shop_from_query_or_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(
            shop_domain(Some("shop=Store.myshopify.com&x=1"), &headers),
            "store.myshopify.com"
        );
        assert_eq!(shop_domain(None, &headers), "unknown");

        headers.insert(SHOP_DOMAIN_HEADER, HeaderValue::from_static("other.myshopify.com"));
        assert_eq!(shop_domain(Some("x=1"), &headers), "other.myshopify.com");
    }
}
