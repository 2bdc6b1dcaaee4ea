//! `PostgreSQL`-backed product catalog.

use async_trait::async_trait;
use carrier_rates_core::ProductId;
use sqlx::PgPool;
use tracing::instrument;

use super::RepositoryError;
use crate::catalog::{ProductCatalog, ProductFacts, ShopSettings, normalize_shop};

/// Product facts and shop settings stored in `PostgreSQL`.
#[derive(Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert or replace the facts recorded for a product.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    #[instrument(skip(self, facts))]
    pub async fn upsert_facts(
        &self,
        shop: &str,
        product_id: ProductId,
        facts: ProductFacts,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO product_facts (shop_domain, product_id, weight_kg, height_mm, diameter_mm)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (shop_domain, product_id) DO UPDATE
            SET weight_kg = $3, height_mm = $4, diameter_mm = $5, updated_at = NOW()
            ",
        )
        .bind(normalize_shop(shop))
        .bind(product_id)
        .bind(facts.weight_kg)
        .bind(facts.height_mm)
        .bind(facts.diameter_mm)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Insert or replace a shop's quoting options.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    #[instrument(skip(self))]
    pub async fn upsert_shop(
        &self,
        shop: &str,
        settings: ShopSettings,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO shops (domain, ship_separately)
            VALUES ($1, $2)
            ON CONFLICT (domain) DO UPDATE
            SET ship_separately = $2, updated_at = NOW()
            ",
        )
        .bind(normalize_shop(shop))
        .bind(settings.ship_separately)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl ProductCatalog for PgCatalog {
    async fn product_facts(
        &self,
        shop: &str,
        product_id: ProductId,
    ) -> Result<Option<ProductFacts>, RepositoryError> {
        let row: Option<(Option<f64>, Option<f64>, Option<f64>)> = sqlx::query_as(
            r"
            SELECT weight_kg, height_mm, diameter_mm
            FROM product_facts
            WHERE shop_domain = $1 AND product_id = $2
            ",
        )
        .bind(normalize_shop(shop))
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(weight_kg, height_mm, diameter_mm)| ProductFacts {
            weight_kg,
            height_mm,
            diameter_mm,
        }))
    }

    async fn shop_settings(&self, shop: &str) -> Result<Option<ShopSettings>, RepositoryError> {
        let row: Option<(bool,)> = sqlx::query_as("SELECT ship_separately FROM shops WHERE domain = $1")
            .bind(normalize_shop(shop))
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(ship_separately,)| ShopSettings { ship_separately }))
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
