//! HTTP API route definitions.

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use super::handlers::{book, health, latest_round, metrics, ready, simulate, AppState};

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(health))
        .route("/ready", get(ready))
        // Market data and simulation
        .route("/api/v1/book", get(book))
        .route("/api/v1/simulate", get(simulate))
        .route("/api/v1/simulations/latest", get(latest_round))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
