//! Event store database schema.
//!
//! The DDL lives in the workspace `migrations/` directory and is embedded
//! here so binaries can bring a database up to date on startup.

use sqlx::migrate::Migrator;

/// Embedded migrations for the event tables.
pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Unique constraint that makes a duplicate sequence number a conflict.
pub const SEQUENCE_CONSTRAINT: &str = "aggregate_events_sequence_unique";
