//! Chronicle Event Store: PostgreSQL persistence for aggregate event streams.
//!
//! `PgEventRepository` implements the append/read/list contract of
//! `chronicle_core::repository::EventRepository`; `EventCleanupAgent` prunes
//! events that have outlived the retention window; `PgDynamicConfig` serves
//! its tunables from a table operators can change at runtime.

pub mod cleanup;
pub mod dynamic_config;
pub mod pg_event_repository;
pub mod schema;

pub use cleanup::{CleanupReport, CleanupSettings, EventCleanupAgent};
pub use dynamic_config::PgDynamicConfig;
pub use pg_event_repository::{PgEventRepository, RepositorySettings};
