//! Database operations for the carrier-service `PostgreSQL`.
//!
//! ## Tables
//!
//! - `shops` - Installed shops and their quoting options
//! - `product_facts` - Weight and dimensions per product
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p carrier-rates-cli -- migrate
//! ```

pub mod catalog;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use catalog::PgCatalog;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),
}

/// Connect the catalog pool.
///
/// Fact lookups sit on the checkout path, so acquiring a connection gives up
/// after two seconds and the quote falls back to default dimensions.
///
/// # Errors
///
/// Returns `sqlx::Error` if the first connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(8)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(2))
        .connect(database_url.expose_secret())
        .await
}
