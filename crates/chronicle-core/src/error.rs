//! Domain error types.

use std::time::Duration;

use thiserror::Error;

/// Top-level domain error type.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Optimistic concurrency conflict: the aggregate changed since the
    /// caller last read it. Callers re-read the version and retry.
    #[error(
        "aggregate change rejected for {aggregate_type}/{aggregate_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        /// Type of the aggregate that had the conflict.
        aggregate_type: String,
        /// Identifier of the aggregate that had the conflict.
        aggregate_id: String,
        /// The version the caller expected.
        expected: i64,
        /// The version found in the store.
        actual: i64,
    },

    /// A stored event carries a type tag no decoder is registered for.
    #[error("unknown event type: {0}")]
    UnknownEventType(String),

    /// A pagination token could not be decoded.
    #[error("invalid page token: {0}")]
    InvalidPageToken(String),

    /// A validation error in caller input.
    #[error("validation error: {0}")]
    Validation(String),

    /// The operation did not finish within its deadline.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl DomainError {
    /// Returns `true` for the optimistic concurrency rejection.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }
}
