//! Operational endpoints: health checks and the recent-callback view.

use axum::{Json, extract::State};

use crate::error::Result;
use crate::rates::recent::RecentView;
use crate::state::AppState;

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
pub async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the product catalog is not reachable.
pub async fn readiness(State(state): State<AppState>) -> Result<&'static str> {
    state.engine().catalog().ping().await?;
    Ok("ok")
}

/// GET /carrier-service/recent - Latest callbacks, newest first.
pub async fn recent_requests(State(state): State<AppState>) -> Json<RecentView> {
    Json(state.engine().recent())
}
