//! Type-safe price representation using decimal arithmetic.
//!
//! Aggregator quotes arrive as decimal strings or floats in CNY. Shopify
//! expects `total_price` as an integer count of minor units, rounded up so a
//! quote is never undercharged by a fraction of a cent.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when converting prices.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PriceError {
    #[error("price {0} does not fit in minor units")]
    Overflow(Decimal),

    #[error("price {0} is not a finite number")]
    NotFinite(String),
}

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (e.g., yuan, not fen).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// Create a CNY price from an aggregator float.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::NotFinite` for NaN or infinite values.
    pub fn cny_from_f64(amount: f64) -> Result<Self, PriceError> {
        let amount = Decimal::from_f64_retain(amount)
            .ok_or_else(|| PriceError::NotFinite(amount.to_string()))?;
        // Float noise beyond 1/10000 of a yuan is never meaningful
        Ok(Self::new(amount.round_dp(4).normalize(), CurrencyCode::CNY))
    }

    /// Amount in minor units, always rounded up (`12.341` becomes `1235`).
    ///
    /// # Errors
    ///
    /// Returns `PriceError::Overflow` if the amount cannot be represented.
    pub fn minor_units_ceil(&self) -> Result<i64, PriceError> {
        self.amount
            .checked_mul(Decimal::ONE_HUNDRED)
            .map(|cents| cents.ceil())
            .and_then(|cents| cents.to_i64())
            .ok_or(PriceError::Overflow(self.amount))
    }
}

/// ISO 4217 currency codes seen at checkout.
///
/// Quotes are always priced in [`CurrencyCode::CNY`]; the checkout currency
/// only changes how close two prices must be to count as duplicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    USD,
    EUR,
    GBP,
    CAD,
    #[default]
    AUD,
    NZD,
    CNY,
    JPY,
    #[serde(other)]
    Other,
}

impl CurrencyCode {
    /// Parse a currency code, case-insensitively. Unknown codes map to `Other`.
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_uppercase().as_str() {
            "USD" => Self::USD,
            "EUR" => Self::EUR,
            "GBP" => Self::GBP,
            "CAD" => Self::CAD,
            "AUD" => Self::AUD,
            "NZD" => Self::NZD,
            "CNY" => Self::CNY,
            "JPY" => Self::JPY,
            _ => Self::Other,
        }
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::USD => "USD",
            Self::EUR => "EUR",
            Self::GBP => "GBP",
            Self::CAD => "CAD",
            Self::AUD => "AUD",
            Self::NZD => "NZD",
            Self::CNY => "CNY",
            Self::JPY => "JPY",
            Self::Other => "XXX",
        }
    }

    /// Whether quotes compared in this currency are bucketed to the nearest 0.50.
    #[must_use]
    pub const fn uses_half_unit_buckets(&self) -> bool {
        matches!(self, Self::GBP | Self::USD)
    }
}

impl std::fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}
