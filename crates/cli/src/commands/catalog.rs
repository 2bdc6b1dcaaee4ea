//! Product facts and shop settings commands.

use carrier_rates_core::ProductId;
use carrier_rates_server::catalog::{ProductFacts, ShopSettings};
use carrier_rates_server::db::{self, PgCatalog};

use super::{CommandError, database_url};

async fn connect() -> Result<PgCatalog, CommandError> {
    let database_url = database_url()?;
    let pool = db::create_pool(&database_url).await?;
    Ok(PgCatalog::new(pool))
}

fn positive(name: &str, value: Option<f64>) -> Result<Option<f64>, CommandError> {
    match value {
        Some(v) if !v.is_finite() || v <= 0.0 => Err(CommandError::InvalidArgument(format!(
            "{name} must be a positive number, got {v}"
        ))),
        _ => Ok(value),
    }
}

/// Insert or replace the facts recorded for a product.
///
/// # Errors
///
/// Returns an error if a measurement is not positive or the database write fails.
pub async fn set_facts(
    shop: &str,
    product_id: i64,
    weight_kg: Option<f64>,
    height_mm: Option<f64>,
    diameter_mm: Option<f64>,
) -> Result<(), CommandError> {
    let facts = ProductFacts {
        weight_kg: positive("weight-kg", weight_kg)?,
        height_mm: positive("height-mm", height_mm)?,
        diameter_mm: positive("diameter-mm", diameter_mm)?,
    };

    let catalog = connect().await?;
    catalog
        .upsert_facts(shop, ProductId::new(product_id), facts)
        .await?;

    tracing::info!(shop, product_id, ?facts, "Product facts saved");
    Ok(())
}

/// Insert or replace a shop's settings.
///
/// # Errors
///
/// Returns an error if the database write fails.
pub async fn set_shop(shop: &str, ship_separately: bool) -> Result<(), CommandError> {
    let catalog = connect().await?;
    catalog
        .upsert_shop(shop, ShopSettings { ship_separately })
        .await?;

    tracing::info!(shop, ship_separately, "Shop settings saved");
    Ok(())
}
