//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                   - Liveness check
//! GET  /health/ready             - Readiness check (catalog reachable)
//!
//! # Carrier service
//! POST /carrier-service          - Shopify rate callback (?shop=<domain>)
//! GET  /carrier-service/recent   - Recent callback summaries
//! ```

pub mod carrier;
pub mod diagnostics;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Build the complete router for the server.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(diagnostics::health))
        .route("/health/ready", get(diagnostics::readiness))
        .route("/carrier-service", post(carrier::carrier_rates))
        .route("/carrier-service/recent", get(diagnostics::recent_requests))
}
