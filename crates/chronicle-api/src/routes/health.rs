//! Health check endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Json, Router, routing::get};
use serde::Serialize;

use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `ok` when the event store is reachable, `degraded` otherwise.
    pub status: &'static str,
    /// Service version.
    pub version: &'static str,
    /// `up` or `down`.
    pub database: &'static str,
}

/// GET /health
///
/// Answers 503 when the database does not respond, so load balancers stop
/// routing to an instance that cannot read or append events.
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let reachable = sqlx::query("SELECT 1").execute(&state.db_pool).await;
    let (status, code, database) = match reachable {
        Ok(_) => ("ok", StatusCode::OK, "up"),
        Err(err) => {
            tracing::warn!(error = %err, "health check could not reach the database");
            ("degraded", StatusCode::SERVICE_UNAVAILABLE, "down")
        }
    };

    (
        code,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION"),
            database,
        }),
    )
}

/// Returns the health check router.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
