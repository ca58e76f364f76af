//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{DateTime, TimeZone, Utc};
use chronicle_core::config::DynamicConfig;
use chronicle_event_store::cleanup::{CleanupSettings, EventCleanupAgent};
use chronicle_event_store::dynamic_config::PgDynamicConfig;
use chronicle_event_store::pg_event_repository::PgEventRepository;
use chronicle_test_support::{FixedClock, StaticConfig};
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;

use chronicle_api::state::AppState;

/// Fixed "now" used across all integration tests.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
}

/// Build the full app router with a real `PgEventRepository` recording
/// events at `now()` and a cleanup agent configured by `config`.
pub fn build_test_app_with_config(pool: PgPool, config: Arc<dyn DynamicConfig>) -> Router {
    let clock = Arc::new(FixedClock(now()));
    let event_repository = PgEventRepository::new(pool.clone()).with_clock(clock.clone());
    let cleanup_agent = EventCleanupAgent::new(pool.clone(), config, CleanupSettings::default())
        .with_clock(clock);
    chronicle_api::app(AppState::new(
        pool,
        Arc::new(event_repository),
        Arc::new(cleanup_agent),
    ))
}

/// Build the full app router with the cleanup limit read from the
/// `dynamic_config` table, as the server does.
pub fn build_test_app_with_db_config(pool: PgPool) -> Router {
    let config = Arc::new(PgDynamicConfig::new(pool.clone()));
    build_test_app_with_config(pool, config)
}

/// Build the full app router with default cleanup configuration.
pub fn build_test_app(pool: PgPool) -> Router {
    build_test_app_with_config(pool, Arc::new(StaticConfig::default()))
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();

    send(app, request).await
}

/// Send a PUT request with a JSON body and return the response.
pub async fn put_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("PUT")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();

    send(app, request).await
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    send(app, request).await
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}

/// Request body appending one event per type tag in `event_types`.
pub fn save_body(expected_version: i64, event_types: &[&str]) -> serde_json::Value {
    let events: Vec<serde_json::Value> = event_types
        .iter()
        .map(|event_type| serde_json::json!({ "event_type": event_type, "payload": {} }))
        .collect();
    serde_json::json!({ "expected_version": expected_version, "events": events })
}
