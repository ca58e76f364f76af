//! Chronicle: HTTP adapter for the event store.
//!
//! Exposes the repository and the cleanup agent over a small JSON API.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod telemetry;

use axum::Router;
use tower_http::trace::TraceLayer;

/// Builds the application router with every route mounted.
pub fn app(state: state::AppState) -> Router {
    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1/aggregates", routes::aggregates::router())
        .nest("/api/v1/admin", routes::admin::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
