//! TTL cache of rendered rate responses.
//!
//! Shopify calls the carrier service on every checkout step, often with an
//! unchanged cart. Responses are cached per cart shape for a few minutes.

use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::Expiry;
use moka::future::Cache;
use sha2::{Digest, Sha256};
use tracing::debug;

use super::render::ShippingRate;
use super::shipment::Shipment;

/// Hex SHA-256 identity of a cart shape.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key for a shipment.
    ///
    /// Covers everything that can change the response: the destination,
    /// the checkout currency, the packed parcel, the cart lines, the item
    /// flags and whether the separate option is offered.
    #[must_use]
    pub fn for_shipment(shipment: &Shipment, ship_separately: bool) -> Self {
        let mut lines: Vec<String> = shipment
            .items
            .iter()
            .map(|item| {
                format!(
                    "{}x{}@{:.3}",
                    item.line.product_id, item.line.quantity, item.weight_kg
                )
            })
            .collect();
        lines.sort_unstable();

        let material = format!(
            "{}|{}|{:.3}|{:.1}|{:.1}|{}|{}{}{}",
            shipment.destination.fingerprint(),
            shipment.currency,
            shipment.parcel.weight_kg,
            shipment.parcel.height_cm,
            shipment.parcel.diameter_cm,
            lines.join(","),
            u8::from(shipment.is_clothing),
            u8::from(shipment.is_battery),
            u8::from(ship_separately),
        );

        Self(hex::encode(Sha256::digest(material.as_bytes())))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Clone)]
struct CachedRates {
    rates: Arc<Vec<ShippingRate>>,
    ttl: Duration,
}

/// Expires each entry after the TTL it was stored with.
struct PerEntryTtl;

impl Expiry<CacheKey, CachedRates> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &CacheKey,
        value: &CachedRates,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &CacheKey,
        value: &CachedRates,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Bounded response cache shared by all requests.
#[derive(Clone)]
pub struct ResponseCache {
    cache: Cache<CacheKey, CachedRates>,
}

impl ResponseCache {
    #[must_use]
    pub fn new(capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(capacity)
            .expire_after(PerEntryTtl)
            .build();
        Self { cache }
    }

    /// Cached rates for a key, if present and not expired.
    pub async fn get(&self, key: &CacheKey) -> Option<Arc<Vec<ShippingRate>>> {
        let hit = self.cache.get(key).await.map(|entry| entry.rates);
        debug!(key = key.as_str(), hit = hit.is_some(), "Rate cache lookup");
        hit
    }

    /// Store rates under a key for `ttl`, replacing any previous entry.
    pub async fn put(&self, key: CacheKey, rates: Arc<Vec<ShippingRate>>, ttl: Duration) {
        self.cache.insert(key, CachedRates { rates, ttl }).await;
    }
}
