//! Application state shared across handlers.

use std::sync::Arc;

use secrecy::SecretString;

use crate::catalog::ProductCatalog;
use crate::config::AppConfig;
use crate::freight::{FreightClient, FreightError};
use crate::rates::RateEngine;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    engine: RateEngine,
    shopify_api_secret: Option<SecretString>,
}

impl AppState {
    /// Create application state from configuration.
    ///
    /// # Arguments
    ///
    /// * `config` - Server configuration
    /// * `catalog` - Product facts source (database or in-memory)
    ///
    /// # Errors
    ///
    /// Returns an error if the aggregator client cannot be built.
    pub fn new(config: &AppConfig, catalog: Arc<dyn ProductCatalog>) -> Result<Self, FreightError> {
        let freight = FreightClient::new(&config.freight)?;
        let engine = RateEngine::new(freight, catalog, config.rates.clone());

        Ok(Self::from_parts(engine, config.shopify_api_secret.clone()))
    }

    /// Assemble state from an existing engine.
    #[must_use]
    pub fn from_parts(engine: RateEngine, shopify_api_secret: Option<SecretString>) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                engine,
                shopify_api_secret,
            }),
        }
    }

    /// Get a reference to the rate engine.
    #[must_use]
    pub fn engine(&self) -> &RateEngine {
        &self.inner.engine
    }

    /// Secret for verifying `X-Shopify-Hmac-Sha256`, if verification is enabled.
    #[must_use]
    pub fn shopify_api_secret(&self) -> Option<&SecretString> {
        self.inner.shopify_api_secret.as_ref()
    }
}
