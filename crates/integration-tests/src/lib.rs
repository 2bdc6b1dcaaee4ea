//! End-to-end tests for the carrier rates service.
//!
//! Each test drives the real axum router with `tower::ServiceExt::oneshot`
//! against a `wiremock` stand-in for the freight aggregator. No database or
//! network access is needed.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p carrier-rates-integration-tests
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use carrier_rates_server::catalog::InMemoryCatalog;
use carrier_rates_server::config::{FreightConfig, RatesConfig};
use carrier_rates_server::freight::FreightClient;
use carrier_rates_server::rates::RateEngine;
use carrier_rates_server::state::AppState;
use secrecy::SecretString;
use serde_json::{Value, json};
use tower::ServiceExt;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Shop domain used by every test callback.
pub const SHOP: &str = "test-store.myshopify.com";

/// Aggregator path the client is pointed at.
pub const AGGREGATOR_PATH: &str = "api/rest/v2/adapt/adaptation/logistics/channel-carriage-list";

/// A router wired to a mock aggregator and an in-memory catalog.
pub struct TestContext {
    pub aggregator: MockServer,
    pub catalog: Arc<InMemoryCatalog>,
    app: Router,
}

impl TestContext {
    /// Context without callback signature verification.
    pub async fn new() -> Self {
        Self::with_secret(None).await
    }

    /// Context that verifies `X-Shopify-Hmac-Sha256` when `secret` is set.
    pub async fn with_secret(secret: Option<&str>) -> Self {
        let aggregator = MockServer::start().await;
        let catalog = Arc::new(InMemoryCatalog::new());

        let freight = FreightClient::new(&FreightConfig {
            base_url: aggregator.uri(),
            api_path: AGGREGATOR_PATH.to_string(),
            app_code: "test-app".to_string(),
            app_secret: SecretString::from("t3st-S3cr3t!"),
            timeout: Duration::from_secs(5),
        })
        .expect("Failed to build aggregator client");

        let engine = RateEngine::new(freight, catalog.clone(), RatesConfig::default());
        let state = AppState::from_parts(engine, secret.map(SecretString::from));

        Self {
            aggregator,
            catalog,
            app: carrier_rates_server::app(state),
        }
    }

    /// Answer every aggregator call with `body`.
    pub async fn mount_aggregator(&self, body: Value) {
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.aggregator)
            .await;
    }

    /// Answer aggregator calls with `body`, asserting the call count on drop.
    pub async fn mount_aggregator_expecting(&self, body: Value, calls: u64) {
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(calls)
            .mount(&self.aggregator)
            .await;
    }

    /// JSON bodies of every request the aggregator received.
    pub async fn aggregator_requests(&self) -> Vec<Value> {
        self.aggregator
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .map(|request| serde_json::from_slice(&request.body).expect("Aggregator body is JSON"))
            .collect()
    }

    /// POST a carrier-service callback.
    pub async fn post_callback(&self, body: Vec<u8>, headers: &[(&str, &str)]) -> Response {
        let mut request = Request::builder()
            .method("POST")
            .uri(format!("/carrier-service?shop={SHOP}"))
            .header("content-type", "application/json");
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        self.send(request.body(Body::from(body)).expect("Failed to build request"))
            .await
    }

    /// GET a path.
    pub async fn get(&self, uri: &str) -> Response {
        self.send(
            Request::builder()
                .uri(uri)
                .body(Body::empty())
                .expect("Failed to build request"),
        )
        .await
    }

    async fn send(&self, request: Request<Body>) -> Response {
        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("Router is infallible");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");

        Response {
            status,
            headers,
            body: bytes.to_vec(),
        }
    }
}

/// A buffered router response.
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Response {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("Response body is JSON")
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The `rates` array of a carrier-service response.
    pub fn rates(&self) -> Vec<Value> {
        self.json()["rates"]
            .as_array()
            .cloned()
            .expect("Response has a rates array")
    }
}

/// A Shopify callback to `country` with the given `items`.
pub fn callback(country: &str, items: &Value) -> Vec<u8> {
    json!({
        "rate": {
            "origin": {"country": "CN", "postal_code": "518000"},
            "destination": {
                "country": country,
                "postal_code": "3000",
                "province": "VIC",
                "city": "Melbourne",
                "address1": "1 Collins St"
            },
            "items": items,
            "currency": "AUD",
            "locale": "en"
        }
    })
    .to_string()
    .into_bytes()
}

/// A successful aggregator answer with a realistic spread of channels.
pub fn aggregator_routes() -> Value {
    json!({
        "success": true,
        "code": 0,
        "data": {
            "total": 6,
            "records": [
                {"serviceName": "Standard Line", "serviceCode": "SL01", "totalPrice": 45.5,
                 "minTimeInTransit": 7, "maxTimeInTransit": 12,
                 "weightLowLimit": 0.01, "weightHighLimit": 30, "available": true},
                {"serviceName": "Economy Line", "serviceCode": "EL02", "totalPrice": 46.1,
                 "minTimeInTransit": 8, "maxTimeInTransit": 13,
                 "weightLowLimit": 0.01, "weightHighLimit": 30, "available": true},
                {"serviceName": "Priority Line", "serviceCode": "PL03", "totalPrice": 88,
                 "minTimeInTransit": 4, "maxTimeInTransit": 7, "available": true},
                {"serviceName": "DHL Express", "serviceCode": "DHL", "totalPrice": 260.04,
                 "minTimeInTransit": 3, "maxTimeInTransit": 5, "available": true},
                {"serviceName": "Battery Special Line", "serviceCode": "BAT", "totalPrice": 30,
                 "minTimeInTransit": 9, "maxTimeInTransit": 15, "available": true},
                {"serviceName": "Heavy Parcel Line", "serviceCode": "HP", "totalPrice": 20,
                 "minTimeInTransit": 9, "maxTimeInTransit": 15,
                 "weightLowLimit": 2, "weightHighLimit": 30, "available": true}
            ]
        }
    })
}

/// The aggregator rejecting a request.
pub fn aggregator_failure() -> Value {
    json!({"success": false, "code": 10_003, "info": "sign error"})
}
