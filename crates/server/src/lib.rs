//! Shopify carrier-calculated shipping service.
//!
//! Shopify calls `POST /carrier-service` during checkout with the cart and
//! destination. This crate quotes the parcel with the BuckyDrop freight
//! aggregator, narrows the dozens of returned channels to a short list of
//! distinct options and answers in Shopify's rate format.
//!
//! The library exposes the pieces so the CLI and integration tests can reuse
//! them; the `carrier-rates-server` binary wires them to an HTTP listener.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod freight;
pub mod rates;
pub mod routes;
pub mod state;

use axum::Router;

use crate::state::AppState;

/// Build the application router with state attached.
pub fn app(state: AppState) -> Router {
    routes::routes().with_state(state)
}
