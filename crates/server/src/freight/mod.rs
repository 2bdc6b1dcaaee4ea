//! BuckyDrop freight aggregator client.
//!
//! Quotes every logistics channel available for a parcel from China to a
//! destination country.
//!
//! # Architecture
//!
//! - One signed POST per quote: `md5(appCode + body + timestamp + appSecret)`
//! - The exact JSON bytes that are signed are the bytes sent
//! - Errors are always surfaced; deciding to show no rates is the caller's job

pub mod client;
pub mod types;

pub use client::{FreightClient, sign};
pub use types::{CarriageQuery, CarriageRecord, ParcelLine};

use thiserror::Error;

/// Errors that can occur when calling the freight aggregator.
#[derive(Debug, Error)]
pub enum FreightError {
    /// Transport failure or timeout.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Aggregator answered with a non-200 status.
    #[error("aggregator returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Aggregator answered 200 with `success: false`.
    #[error("aggregator error {code}: {message}")]
    Upstream { code: String, message: String },

    /// Response body was not the expected JSON.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Configured base URL or path cannot form a URL.
    #[error("invalid aggregator endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
}

impl FreightError {
    /// Whether the aggregator itself rejected the request, as opposed to the
    /// request never completing.
    #[must_use]
    pub const fn is_upstream(&self) -> bool {
        matches!(self, Self::Status { .. } | Self::Upstream { .. })
    }
}
