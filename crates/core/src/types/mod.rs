//! Core types for carrier rates.
//!
//! This module provides type-safe wrappers for common shipping concepts.

pub mod country;
pub mod destination;
pub mod dimensions;
pub mod id;
pub mod price;
pub mod route;

pub use country::{Country, resolve_country};
pub use destination::Destination;
pub use dimensions::{AdjustedDimensions, adjust_dimensions};
pub use id::*;
pub use price::{CurrencyCode, Price, PriceError};
pub use route::{CarrierFamily, RouteQuote};
