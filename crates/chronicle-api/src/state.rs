//! Shared application state.

use std::sync::Arc;

use chronicle_core::repository::EventRepository;
use chronicle_event_store::cleanup::EventCleanupAgent;
use sqlx::PgPool;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL connection pool, used for health checks and dynamic config.
    pub db_pool: PgPool,
    /// Event persistence.
    pub event_repository: Arc<dyn EventRepository>,
    /// Retention agent, also triggered on demand by the admin route.
    pub cleanup_agent: Arc<EventCleanupAgent>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(
        db_pool: PgPool,
        event_repository: Arc<dyn EventRepository>,
        cleanup_agent: Arc<EventCleanupAgent>,
    ) -> Self {
        Self {
            db_pool,
            event_repository,
            cleanup_agent,
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("db_pool", &self.db_pool)
            .field("cleanup_agent", &self.cleanup_agent)
            .finish_non_exhaustive()
    }
}
