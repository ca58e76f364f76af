//! Operator endpoints.

use axum::extract::{Path, State};
use axum::routing::{post, put};
use axum::{Json, Router};
use chronicle_event_store::cleanup::CleanupReport;
use chronicle_event_store::dynamic_config::PgDynamicConfig;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for setting a dynamic config value.
#[derive(Debug, Deserialize)]
pub struct SetConfigRequest {
    /// New value.
    pub value: i64,
}

/// Response body echoing a stored dynamic config value.
#[derive(Debug, Serialize)]
pub struct ConfigEntry {
    /// Config key, e.g. `event.cleanup.limit`.
    pub key: String,
    /// Stored value.
    pub value: i64,
}

/// POST /api/v1/admin/cleanup
///
/// Runs one retention pass immediately, outside the regular schedule.
#[instrument(skip(state))]
async fn run_cleanup(State(state): State<AppState>) -> Result<Json<CleanupReport>, ApiError> {
    let report = state.cleanup_agent.run().await?;
    Ok(Json(report))
}

/// PUT /api/v1/admin/config/{key}
///
/// Stores a dynamic config value; the cleanup agent picks it up on its next
/// run.
#[instrument(skip(state, request), fields(value = request.value))]
async fn set_config(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(request): Json<SetConfigRequest>,
) -> Result<Json<ConfigEntry>, ApiError> {
    PgDynamicConfig::new(state.db_pool.clone())
        .set_int(&key, request.value)
        .await?;
    Ok(Json(ConfigEntry {
        key,
        value: request.value,
    }))
}

/// Returns the admin router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/cleanup", post(run_cleanup))
        .route("/config/{key}", put(set_config))
}
