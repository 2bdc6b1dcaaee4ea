//! Rate engine: turns a checkout callback into rendered rates.
//!
//! # Flow
//!
//! 1. Parse and validate the callback
//! 2. Look up product facts and shop settings concurrently
//! 3. Serve from the response cache when the cart shape was quoted recently
//! 4. Otherwise quote the consolidated parcel and, when offered, each line on
//!    its own, concurrently
//! 5. Filter, render and cache
//!
//! Steps 2 onward run on a spawned task bounded by the checkout deadline. A
//! task that misses the deadline keeps running so its result is cached for
//! Shopify's retry.

use std::sync::Arc;
use std::time::Instant;

use carrier_rates_core::RouteQuote;
use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, error, info, instrument, warn};

use super::QuoteError;
use super::cache::{CacheKey, ResponseCache};
use super::filter;
use super::recent::{RecentRequests, RecentView, RequestSummary};
use super::render::{SeparateShipping, ShippingRate, render_rates};
use super::shipment::{RateRequest, Shipment};
use crate::catalog::{ProductCatalog, ShopSettings};
use crate::config::RatesConfig;
use crate::freight::{FreightClient, FreightError};

/// Minimum number of cart lines for the "ship separately" option.
const SEPARATE_MIN_LINES: usize = 2;

/// Summaries shown by the diagnostics endpoint.
const RECENT_VIEW_LIMIT: usize = 5;

/// Rates answered to one callback.
#[derive(Debug, Clone)]
pub struct QuoteOutcome {
    pub rates: Arc<Vec<ShippingRate>>,
    pub cache_hit: bool,
}

impl QuoteOutcome {
    fn empty() -> Self {
        Self {
            rates: Arc::new(Vec::new()),
            cache_hit: false,
        }
    }
}

/// Quoting service shared by all requests.
///
/// Cheap to clone.
#[derive(Clone)]
pub struct RateEngine {
    inner: Arc<RateEngineInner>,
}

struct RateEngineInner {
    freight: FreightClient,
    catalog: Arc<dyn ProductCatalog>,
    cache: ResponseCache,
    recent: RecentRequests,
    config: RatesConfig,
}

struct Resolved {
    shipment: Shipment,
    rates: Arc<Vec<ShippingRate>>,
    cache_hit: bool,
}

impl RateEngine {
    #[must_use]
    pub fn new(
        freight: FreightClient,
        catalog: Arc<dyn ProductCatalog>,
        config: RatesConfig,
    ) -> Self {
        Self {
            inner: Arc::new(RateEngineInner {
                freight,
                catalog,
                cache: ResponseCache::new(config.cache_capacity),
                recent: RecentRequests::new(),
                config,
            }),
        }
    }

    /// Product facts and shop settings source.
    #[must_use]
    pub fn catalog(&self) -> &Arc<dyn ProductCatalog> {
        &self.inner.catalog
    }

    /// Recent callbacks, newest first.
    #[must_use]
    pub fn recent(&self) -> RecentView {
        self.inner.recent.view(RECENT_VIEW_LIMIT)
    }

    /// Quote a raw callback body for a shop.
    ///
    /// Never fails: every problem is logged and answered with no rates.
    #[instrument(skip(self, body), fields(shop = %shop, body_bytes = body.len()))]
    pub async fn quote(&self, shop: &str, body: &[u8]) -> QuoteOutcome {
        let started = Instant::now();
        let mut summary = RequestSummary {
            received_at: Utc::now(),
            shop: shop.to_string(),
            country_code: None,
            postal_code: None,
            currency: None,
            weight_kg: None,
            parcel: None,
            total_quantity: None,
            line_items: 0,
            is_clothing: false,
            is_battery: false,
            cache_hit: false,
            rate_count: 0,
            outcome: "ok".to_string(),
            elapsed_ms: 0,
        };

        let result = match RateRequest::parse(body) {
            Ok(request) => {
                summary.country_code = Some(request.destination.country_code.clone());
                summary.postal_code = Some(request.destination.postal_code.clone());
                summary.currency = Some(request.currency.to_string());
                summary.line_items = request.line_items.len();
                self.quote_request(shop, request).await
            }
            Err(e) => Err(e),
        };

        let outcome = match result {
            Ok(resolved) => {
                let shipment = &resolved.shipment;
                summary.weight_kg = Some(shipment.weight_kg);
                summary.parcel = Some(shipment.parcel);
                summary.total_quantity = Some(shipment.total_quantity);
                summary.is_clothing = shipment.is_clothing;
                summary.is_battery = shipment.is_battery;
                QuoteOutcome {
                    rates: resolved.rates,
                    cache_hit: resolved.cache_hit,
                }
            }
            Err(e) => {
                log_failure(&e);
                summary.outcome = e.kind().to_string();
                QuoteOutcome::empty()
            }
        };

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        summary.cache_hit = outcome.cache_hit;
        summary.rate_count = outcome.rates.len();
        summary.elapsed_ms = elapsed_ms;
        self.inner.recent.record(summary);

        info!(
            rates = outcome.rates.len(),
            cache_hit = outcome.cache_hit,
            elapsed_ms,
            "Carrier rates answered"
        );
        outcome
    }

    async fn quote_request(&self, shop: &str, request: RateRequest) -> Result<Resolved, QuoteError> {
        let deadline = self.inner.config.deadline;
        let engine = self.clone();
        let shop = shop.to_string();

        let task = tokio::spawn(async move { engine.resolve(&shop, request).await });

        match tokio::time::timeout(deadline, task).await {
            Ok(joined) => joined?,
            Err(_) => Err(QuoteError::Deadline(deadline)),
        }
    }

    async fn resolve(&self, shop: &str, request: RateRequest) -> Result<Resolved, QuoteError> {
        let catalog = &self.inner.catalog;

        let lookups: Vec<_> = request
            .line_items
            .iter()
            .map(|item| {
                let catalog = Arc::clone(catalog);
                let shop = shop.to_string();
                let product_id = item.product_id;
                async move {
                    catalog
                        .product_facts(&shop, product_id)
                        .await
                        .unwrap_or_else(|e| {
                            warn!(%product_id, error = %e, "Product facts lookup failed");
                            None
                        })
                }
            })
            .collect();
        let (facts, settings) = tokio::join!(join_all(lookups), catalog.shop_settings(shop));

        let settings = settings
            .unwrap_or_else(|e| {
                warn!(error = %e, "Shop settings lookup failed");
                None
            })
            .unwrap_or_default();

        let shipment = Shipment::new(shop, request, facts);
        let offer_separate = offers_separate(&settings, &shipment);
        let key = CacheKey::for_shipment(&shipment, offer_separate);

        if let Some(rates) = self.inner.cache.get(&key).await {
            return Ok(Resolved {
                shipment,
                rates,
                cache_hit: true,
            });
        }

        let rates = Arc::new(self.compute(&shipment, offer_separate).await?);
        self.inner
            .cache
            .put(key, Arc::clone(&rates), self.inner.config.cache_ttl)
            .await;

        Ok(Resolved {
            shipment,
            rates,
            cache_hit: false,
        })
    }

    #[instrument(
        skip(self, shipment),
        fields(
            country = %shipment.country.code,
            weight_kg = shipment.parcel.weight_kg,
            lines = shipment.items.len(),
        )
    )]
    async fn compute(
        &self,
        shipment: &Shipment,
        offer_separate: bool,
    ) -> Result<Vec<ShippingRate>, QuoteError> {
        let freight = &self.inner.freight;
        let consolidated_query = shipment.consolidated_query();

        let consolidated = freight.fetch_rates(&consolidated_query);
        let per_item = async {
            if !offer_separate {
                return None;
            }
            let quotes: Vec<_> = shipment
                .items
                .iter()
                .map(|item| {
                    let freight = freight.clone();
                    let query = shipment.item_query(item);
                    async move { freight.fetch_rates(&query).await }
                })
                .collect();
            Some(join_all(quotes).await)
        };

        let (consolidated, per_item) = tokio::join!(consolidated, per_item);

        let selected = filter::select(consolidated?, &shipment.filter_context());
        let separate = per_item.and_then(|results| separate_option(shipment, results));

        debug!(
            selected = selected.len(),
            separate = separate.is_some(),
            "Routes selected"
        );

        Ok(render_rates(
            &selected,
            separate.as_ref(),
            Utc::now().date_naive(),
        )?)
    }
}

fn offers_separate(settings: &ShopSettings, shipment: &Shipment) -> bool {
    settings.ship_separately && shipment.items.len() >= SEPARATE_MIN_LINES
}

/// Cheapest eligible route per line, combined. `None` unless every line has one.
fn separate_option(
    shipment: &Shipment,
    results: Vec<Result<Vec<RouteQuote>, FreightError>>,
) -> Option<SeparateShipping> {
    let mut cheapest = Vec::with_capacity(results.len());

    for (item, result) in shipment.items.iter().zip(results) {
        let routes = match result {
            Ok(routes) => routes,
            Err(e) => {
                warn!(product_id = %item.line.product_id, error = %e, "Per-item quote failed");
                return None;
            }
        };
        let Some(route) = filter::cheapest_eligible(routes, &shipment.item_filter_context(item))
        else {
            debug!(product_id = %item.line.product_id, "No eligible route for item");
            return None;
        };
        cheapest.push(route);
    }

    SeparateShipping::combine(&cheapest)
}

fn log_failure(e: &QuoteError) {
    match e {
        QuoteError::Validation(_) => warn!(error = %e, "Rejected carrier callback"),
        QuoteError::Deadline(_) => warn!(error = %e, "Carrier callback missed deadline"),
        QuoteError::Freight(freight) if freight.is_upstream() => {
            error!(error = %e, "Aggregator rejected quote request");
        }
        QuoteError::Freight(_) | QuoteError::Price(_) | QuoteError::Task(_) => {
            error!(error = %e, kind = e.kind(), "Failed to quote carrier rates");
        }
    }
}
