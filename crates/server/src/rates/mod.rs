//! Shipping rate computation for checkout callbacks.
//!
//! A callback flows through:
//!
//! 1. [`shipment`] - parse the payload and aggregate the cart into one parcel
//! 2. [`cache`] - reuse a response rendered for an identical cart
//! 3. [`crate::freight`] - fetch candidate routes (consolidated and per item)
//! 4. [`filter`] - reduce candidates to a short, distinct list
//! 5. [`render`] - convert routes to Shopify rate objects
//!
//! [`engine::RateEngine`] ties the steps together under a deadline.

pub mod cache;
pub mod engine;
pub mod filter;
pub mod naming;
pub mod recent;
pub mod render;
pub mod shipment;

use std::time::Duration;

use carrier_rates_core::PriceError;
use thiserror::Error;

use crate::freight::FreightError;

pub use cache::{CacheKey, ResponseCache};
pub use engine::{QuoteOutcome, RateEngine};
pub use recent::{RecentRequests, RequestSummary};
pub use render::ShippingRate;
pub use shipment::{LineItem, RateRequest, Shipment};

/// Reasons a callback produced no rates.
///
/// None of these reach checkout as an error; they decide what gets logged.
#[derive(Debug, Error)]
pub enum QuoteError {
    /// The callback payload cannot be quoted.
    #[error("invalid rate request: {0}")]
    Validation(String),

    /// The aggregator call failed.
    #[error("freight aggregator error: {0}")]
    Freight(#[from] FreightError),

    /// A route price could not be rendered.
    #[error("price error: {0}")]
    Price(#[from] PriceError),

    /// The callback ran out of time.
    #[error("quote exceeded {0:?} deadline")]
    Deadline(Duration),

    /// The background computation panicked or was cancelled.
    #[error("quote task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl QuoteError {
    /// Short label for logs and the recent-requests view.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Freight(_) => "freight",
            Self::Price(_) => "price",
            Self::Deadline(_) => "deadline",
            Self::Task(_) => "task",
        }
    }
}
