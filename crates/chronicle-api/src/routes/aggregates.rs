//! Aggregate listing and event stream routes.

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chronicle_core::error::DomainError;
use chronicle_core::event::{NewEvent, StoredEvent};
use chronicle_core::repository::{ListAggregatesCriteria, ListAggregatesResult};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// One event in a save request.
#[derive(Debug, Deserialize)]
pub struct EventInput {
    /// Type tag of the event.
    pub event_type: String,
    /// Event body.
    pub payload: serde_json::Value,
    /// Request correlation, copied into the event metadata.
    #[serde(default)]
    pub correlation_id: Option<Uuid>,
}

/// Request body for appending events.
#[derive(Debug, Deserialize)]
pub struct SaveEventsRequest {
    /// Version the caller last observed; 0 for a new aggregate.
    pub expected_version: i64,
    /// Events to append, in order.
    pub events: Vec<EventInput>,
}

/// Response body for a successful append.
#[derive(Debug, Serialize)]
pub struct SaveEventsResponse {
    /// Aggregate version after the append.
    pub version: i64,
    /// Sequence numbers assigned to the appended events.
    pub sequence_numbers: Vec<i64>,
}

/// Response body for reading an event stream.
#[derive(Debug, Serialize)]
pub struct EventStreamResponse {
    /// Sequence number of the last retained event, 0 when none remain.
    pub version: i64,
    /// Events in sequence order.
    pub events: Vec<StoredEvent>,
}

/// GET /api/v1/aggregates
#[instrument(skip(state))]
async fn list_aggregates(
    State(state): State<AppState>,
    Query(criteria): Query<ListAggregatesCriteria>,
) -> Result<Json<ListAggregatesResult>, ApiError> {
    let page = state.event_repository.list_aggregates(&criteria).await?;
    Ok(Json(page))
}

/// GET /api/v1/aggregates/{aggregate_type}/{aggregate_id}/events
#[instrument(skip(state))]
async fn list_events(
    State(state): State<AppState>,
    Path((aggregate_type, aggregate_id)): Path<(String, String)>,
) -> Result<Json<EventStreamResponse>, ApiError> {
    let events = state
        .event_repository
        .list(&aggregate_type, &aggregate_id)
        .await?;
    let version = events.last().map_or(0, |event| event.sequence_number);
    Ok(Json(EventStreamResponse { version, events }))
}

/// POST /api/v1/aggregates/{aggregate_type}/{aggregate_id}/events
#[instrument(
    skip(state, request),
    fields(expected_version = request.expected_version, event_count = request.events.len())
)]
async fn save_events(
    State(state): State<AppState>,
    Path((aggregate_type, aggregate_id)): Path<(String, String)>,
    Json(request): Json<SaveEventsRequest>,
) -> Result<Json<SaveEventsResponse>, ApiError> {
    if request.events.is_empty() {
        return Err(DomainError::Validation("events must not be empty".into()).into());
    }

    let events: Vec<NewEvent> = request
        .events
        .into_iter()
        .map(|input| {
            let event = NewEvent::new(input.event_type, input.payload);
            match input.correlation_id {
                Some(correlation_id) => event.with_correlation_id(correlation_id),
                None => event,
            }
        })
        .collect();

    let committed = state
        .event_repository
        .save(
            &aggregate_type,
            &aggregate_id,
            request.expected_version,
            &events,
        )
        .await?;

    let sequence_numbers: Vec<i64> = committed.iter().map(|e| e.sequence_number).collect();
    let version = sequence_numbers
        .last()
        .copied()
        .unwrap_or(request.expected_version);
    info!(%aggregate_type, %aggregate_id, version, "events appended");

    Ok(Json(SaveEventsResponse {
        version,
        sequence_numbers,
    }))
}

/// Returns the aggregates router.
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_aggregates)).route(
        "/{aggregate_type}/{aggregate_id}/events",
        get(list_events).post(save_events),
    )
}
