//! Product facts and shop settings consulted while quoting.
//!
//! Lookups are local (database or memory), never networked. A missing fact is
//! not an error: the quote falls back to default parcel dimensions.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use carrier_rates_core::ProductId;
use serde::{Deserialize, Serialize};

use crate::db::RepositoryError;

/// Physical facts recorded for a product.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductFacts {
    /// Unit weight, used when checkout does not send grams.
    pub weight_kg: Option<f64>,
    pub height_mm: Option<f64>,
    pub diameter_mm: Option<f64>,
}

/// Per-shop quoting options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopSettings {
    /// Offer a "ship separately" rate next to the consolidated ones.
    pub ship_separately: bool,
}

impl Default for ShopSettings {
    fn default() -> Self {
        Self {
            ship_separately: true,
        }
    }
}

/// Source of product facts and shop settings.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Facts for one product, if any are recorded.
    async fn product_facts(
        &self,
        shop: &str,
        product_id: ProductId,
    ) -> Result<Option<ProductFacts>, RepositoryError>;

    /// Settings for a shop, if the shop is known.
    async fn shop_settings(&self, shop: &str) -> Result<Option<ShopSettings>, RepositoryError>;

    /// Whether the backing store is reachable.
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

/// In-memory catalog for tests and database-less deployments.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    facts: RwLock<HashMap<(String, ProductId), ProductFacts>>,
    shops: RwLock<HashMap<String, ShopSettings>>,
}

impl InMemoryCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // A panic elsewhere cannot leave a half-written entry in these maps, so
    // readers and writers both carry on past a poisoned lock.

    /// Record facts for a product.
    pub fn insert_facts(&self, shop: &str, product_id: ProductId, facts: ProductFacts) {
        self.facts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((normalize_shop(shop), product_id), facts);
    }

    /// Record settings for a shop.
    pub fn insert_shop(&self, shop: &str, settings: ShopSettings) {
        self.shops
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(normalize_shop(shop), settings);
    }
}

#[async_trait]
impl ProductCatalog for InMemoryCatalog {
    async fn product_facts(
        &self,
        shop: &str,
        product_id: ProductId,
    ) -> Result<Option<ProductFacts>, RepositoryError> {
        let map = self.facts.read().unwrap_or_else(PoisonError::into_inner);
        Ok(map.get(&(normalize_shop(shop), product_id)).copied())
    }

    async fn shop_settings(&self, shop: &str) -> Result<Option<ShopSettings>, RepositoryError> {
        let map = self.shops.read().unwrap_or_else(PoisonError::into_inner);
        Ok(map.get(&normalize_shop(shop)).copied())
    }
}

/// Shop domains are case-insensitive (`Store.myshopify.com` == `store.myshopify.com`).
#[must_use]
pub fn normalize_shop(shop: &str) -> String {
    shop.trim().to_ascii_lowercase()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_facts_lookup() {
        let catalog = InMemoryCatalog::new();
        let facts = ProductFacts {
            weight_kg: Some(0.35),
            height_mm: Some(180.0),
            diameter_mm: Some(70.0),
        };
        catalog.insert_facts("Shop.myshopify.com", ProductId::new(11), facts);

        let found = catalog
            .product_facts("shop.myshopify.com", ProductId::new(11))
            .await
            .unwrap();
        assert_eq!(found, Some(facts));

        let missing = catalog
            .product_facts("shop.myshopify.com", ProductId::new(12))
            .await
            .unwrap();
        assert_eq!(missing, None);
    }

    #[tokio::test]
    async fn test_in_memory_shop_settings() {
        let catalog = InMemoryCatalog::new();
        catalog.insert_shop("a.myshopify.com", ShopSettings { ship_separately: false });

        assert_eq!(
            catalog.shop_settings("A.myshopify.com").await.unwrap(),
            Some(ShopSettings { ship_separately: false })
        );
        assert_eq!(catalog.shop_settings("b.myshopify.com").await.unwrap(), None);
        assert!(catalog.ping().await.is_ok());
    }

    #[test]
    fn test_default_settings_offer_ship_separately() {
        assert!(ShopSettings::default().ship_separately);
    }

    #[tokio::test]
    async fn test_poisoned_catalog_still_reads_and_writes() {
        let catalog = std::sync::Arc::new(InMemoryCatalog::new());
        catalog.insert_shop("a.myshopify.com", ShopSettings { ship_separately: false });

        let poisoner = std::sync::Arc::clone(&catalog);
        let outcome = std::thread::spawn(move || {
            let _facts = poisoner.facts.write().unwrap();
            let _shops = poisoner.shops.write().unwrap();
            panic!("writer died holding the locks");
        })
        .join();
        assert!(outcome.is_err());
        assert!(catalog.facts.is_poisoned());

        catalog.insert_facts("a.myshopify.com", ProductId::new(7), ProductFacts::default());
        catalog.insert_shop("b.myshopify.com", ShopSettings::default());

        assert_eq!(
            catalog.product_facts("a.myshopify.com", ProductId::new(7)).await.unwrap(),
            Some(ProductFacts::default())
        );
        assert_eq!(
            catalog.shop_settings("a.myshopify.com").await.unwrap(),
            Some(ShopSettings { ship_separately: false })
        );
        assert!(catalog.shop_settings("b.myshopify.com").await.unwrap().is_some());
    }
}
