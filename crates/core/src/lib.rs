//! Carrier Rates Core - Shared shipping domain types.
//!
//! This crate provides the types used across all carrier-rates components:
//! - `server` - Shopify carrier-service callback (rate engine)
//! - `cli` - Command-line tools for migrations, product facts and ad-hoc quotes
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. This keeps it lightweight and allows it to be used
//! anywhere.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, prices, countries, parcel dimensions and routes

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
