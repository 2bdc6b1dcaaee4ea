//! Signed HTTP client for the freight aggregator.

use std::sync::Arc;

use carrier_rates_core::RouteQuote;
use md5::{Digest, Md5};
use secrecy::{ExposeSecret, SecretString};
use tracing::instrument;
use url::Url;

use super::FreightError;
use super::types::{CarriageEnvelope, CarriageQuery, CarriageResponse};
use crate::config::FreightConfig;

/// Longest response body kept in error messages and logs.
const MAX_LOGGED_BODY: usize = 500;

/// Freight aggregator API client.
///
/// Cheap to clone; all clones share one connection pool.
#[derive(Clone)]
pub struct FreightClient {
    inner: Arc<FreightClientInner>,
}

struct FreightClientInner {
    client: reqwest::Client,
    endpoint: Url,
    app_code: String,
    app_secret: SecretString,
}

/// Request signature: lowercase hex MD5 of `app_code + body + timestamp + app_secret`.
#[must_use]
pub fn sign(app_code: &str, body: &str, timestamp_ms: i64, app_secret: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(app_code.as_bytes());
    hasher.update(body.as_bytes());
    hasher.update(timestamp_ms.to_string().as_bytes());
    hasher.update(app_secret.as_bytes());
    hex::encode(hasher.finalize())
}

impl FreightClient {
    /// Create a new aggregator client.
    ///
    /// # Errors
    ///
    /// Returns `FreightError::Endpoint` if the base URL and path do not form a
    /// valid URL, or `FreightError::Network` if the HTTP client cannot be built.
    pub fn new(config: &FreightConfig) -> Result<Self, FreightError> {
        let endpoint = Url::parse(&format!(
            "{}/{}",
            config.base_url.trim_end_matches('/'),
            config.api_path.trim_start_matches('/')
        ))?;

        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            inner: Arc::new(FreightClientInner {
                client,
                endpoint,
                app_code: config.app_code.clone(),
                app_secret: config.app_secret.clone(),
            }),
        })
    }

    /// Fetch every route the aggregator offers for a parcel, cheapest first.
    ///
    /// # Errors
    ///
    /// Returns `FreightError::Network` on transport failure or timeout,
    /// `FreightError::Status` on a non-200 response,
    /// `FreightError::Upstream` when the aggregator reports `success: false`,
    /// and `FreightError::Parse` when the body is not the expected JSON.
    #[instrument(
        skip(self, query),
        fields(
            country = %query.country_code,
            weight_kg = query.product_list.first().map(|p| p.weight),
        )
    )]
    pub async fn fetch_rates(&self, query: &CarriageQuery) -> Result<Vec<RouteQuote>, FreightError> {
        let body = serde_json::to_string(&CarriageEnvelope::first_page(query))?;
        let timestamp = chrono::Utc::now().timestamp_millis();
        let signature = sign(
            &self.inner.app_code,
            &body,
            timestamp,
            self.inner.app_secret.expose_secret(),
        );

        let mut url = self.inner.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("appCode", &self.inner.app_code)
            .append_pair("timestamp", &timestamp.to_string())
            .append_pair("sign", &signature);

        let response = self
            .inner
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if status != reqwest::StatusCode::OK {
            let body = truncate(&text);
            tracing::error!(status = status.as_u16(), body = %body, "Aggregator returned error status");
            return Err(FreightError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: CarriageResponse = serde_json::from_str(&text).inspect_err(|e| {
            tracing::error!(error = %e, body = %truncate(&text), "Failed to parse aggregator response");
        })?;

        if !parsed.success {
            let code = parsed.code_text();
            let message = parsed
                .info
                .clone()
                .unwrap_or_else(|| "no message".to_string());
            tracing::warn!(code = %code, message = %message, "Aggregator rejected quote request");
            return Err(FreightError::Upstream { code, message });
        }

        let records = parsed.into_records();
        let total = records.len();
        let routes: Vec<RouteQuote> = records
            .into_iter()
            .filter_map(super::types::CarriageRecord::into_route)
            .collect();

        tracing::debug!(records = total, priced = routes.len(), "Aggregator quote received");
        Ok(routes)
    }
}

fn truncate(text: &str) -> String {
    if text.chars().count() > MAX_LOGGED_BODY {
        let head: String = text.chars().take(MAX_LOGGED_BODY).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use carrier_rates_core::{Destination, adjust_dimensions, resolve_country};
    use rust_decimal::Decimal;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    use super::*;

    const API_PATH: &str = "api/rest/v2/adapt/adaptation/logistics/channel-carriage-list";

    fn config(base_url: &str) -> FreightConfig {
        FreightConfig {
            base_url: base_url.to_string(),
            api_path: API_PATH.to_string(),
            app_code: "app-123".to_string(),
            app_secret: SecretString::from("s3cr3t-K9x!"),
            timeout: Duration::from_secs(5),
        }
    }

    fn query() -> CarriageQuery {
        CarriageQuery::new(
            &resolve_country("AU"),
            &Destination::new("AU", "Victoria", "VIC", "3000", "1 Collins St"),
            adjust_dimensions(Some(0.48), None, None),
            1,
        )
    }

    #[test]
    fn test_sign_is_stable_md5_hex() {
        let first = sign("app", "{}", 1_700_000_000_000, "secret");
        let second = sign("app", "{}", 1_700_000_000_000, "secret");
        assert_eq!(first, second);
        assert_eq!(first.len(), 32);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        // md5("app{}1700000000000secret") computed independently
        assert_eq!(first, format!("{:x}", Md5::digest(b"app{}1700000000000secret")));
    }

    #[test]
    fn test_sign_changes_with_every_input() {
        let base = sign("app", "{}", 1, "secret");
        assert_ne!(base, sign("app2", "{}", 1, "secret"));
        assert_ne!(base, sign("app", "{ }", 1, "secret"));
        assert_ne!(base, sign("app", "{}", 2, "secret"));
        assert_ne!(base, sign("app", "{}", 1, "secret2"));
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let result = FreightClient::new(&config("not a url"));
        assert!(matches!(result, Err(FreightError::Endpoint(_))));
    }

    #[tokio::test]
    async fn test_fetch_rates_sends_signed_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(format!("/{API_PATH}")))
            .and(query_param("appCode", "app-123"))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": {"records": [
                    {"serviceName": "ePacket", "totalPrice": 45.5, "minTimeInTransit": 7,
                     "maxTimeInTransit": 12, "weightLowLimit": 0.01, "weightHighLimit": 2,
                     "available": true},
                    {"serviceName": "Unpriced", "available": true}
                ]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = FreightClient::new(&config(&server.uri())).unwrap();
        let routes = client.fetch_rates(&query()).await.unwrap();

        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].service_name, "ePacket");
        assert_eq!(routes[0].price, Decimal::new(455, 1));

        let requests: Vec<Request> = server.received_requests().await.unwrap();
        let request = &requests[0];
        let params: std::collections::HashMap<String, String> =
            request.url.query_pairs().into_owned().collect();
        let body = String::from_utf8(request.body.clone()).unwrap();
        let timestamp: i64 = params["timestamp"].parse().unwrap();

        assert_eq!(params["sign"], sign("app-123", &body, timestamp, "s3cr3t-K9x!"));
        assert!(body.starts_with(r#"{"size":50,"current":1,"item":"#));
    }

    #[tokio::test]
    async fn test_fetch_rates_keeps_routes_next_to_odd_records() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": {"records": [
                    {"serviceName": "ePacket", "totalPrice": 45.5, "minTimeInTransit": 7,
                     "maxTimeInTransit": 12, "available": true},
                    {"serviceName": "Tracked Line", "totalPrice": "61.2",
                     "minTimeInTransit": "8", "maxTimeInTransit": 14.0, "available": "true"},
                    {"serviceName": {"en": "Broken"}, "totalPrice": 10}
                ]}
            })))
            .mount(&server)
            .await;

        let client = FreightClient::new(&config(&server.uri())).unwrap();
        let routes = client.fetch_rates(&query()).await.unwrap();

        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].service_name, "ePacket");
        assert_eq!(routes[1].price, Decimal::new(612, 1));
        assert_eq!((routes[1].min_days, routes[1].max_days), (8, 14));
    }

    #[tokio::test]
    async fn test_fetch_rates_upstream_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "code": "10003",
                "info": "sign error"
            })))
            .mount(&server)
            .await;

        let client = FreightClient::new(&config(&server.uri())).unwrap();
        let err = client.fetch_rates(&query()).await.unwrap_err();

        match err {
            FreightError::Upstream { code, message } => {
                assert_eq!(code, "10003");
                assert_eq!(message, "sign error");
            }
            other => panic!("expected upstream error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_rates_http_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let client = FreightClient::new(&config(&server.uri())).unwrap();
        let err = client.fetch_rates(&query()).await.unwrap_err();

        assert!(matches!(err, FreightError::Status { status: 503, ref body } if body == "maintenance"));
    }

    #[tokio::test]
    async fn test_fetch_rates_timeout_is_network_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"success": true, "data": {"records": []}}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let mut config = config(&server.uri());
        config.timeout = Duration::from_millis(200);
        let client = FreightClient::new(&config).unwrap();
        let err = client.fetch_rates(&query()).await.unwrap_err();

        assert!(matches!(err, FreightError::Network(_)));
    }

    #[test]
    fn test_truncate_long_body() {
        let long = "x".repeat(600);
        let truncated = truncate(&long);
        assert_eq!(truncated.len(), MAX_LOGGED_BODY + 3);
        assert_eq!(truncate("short"), "short");
    }
}
