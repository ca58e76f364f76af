//! Event repository abstraction.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::event::{NewEvent, StoredEvent};

/// Listing view of an aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateSummary {
    /// Aggregate type.
    pub aggregate_type: String,
    /// Aggregate identifier.
    pub aggregate_id: String,
    /// Sequence number of the aggregate's last event.
    pub version: i64,
}

/// Filter and paging options for `EventRepository::list_aggregates`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListAggregatesCriteria {
    /// Only list aggregates of this type.
    #[serde(default)]
    pub aggregate_type: Option<String>,
    /// Maximum number of summaries per page. `None` lists everything.
    #[serde(default)]
    pub per_page: Option<u32>,
    /// Token returned by the previous page.
    #[serde(default)]
    pub token: Option<String>,
}

impl ListAggregatesCriteria {
    /// Restricts the listing to one aggregate type.
    #[must_use]
    pub fn with_aggregate_type(mut self, aggregate_type: impl Into<String>) -> Self {
        self.aggregate_type = Some(aggregate_type.into());
        self
    }

    /// Sets the page size.
    #[must_use]
    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = Some(per_page);
        self
    }

    /// Resumes after the page that produced `token`.
    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }
}

/// One page of aggregate summaries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListAggregatesResult {
    /// Summaries in first-appearance order.
    pub aggregates: Vec<AggregateSummary>,
    /// Token for the next page; `None` on the last page.
    pub next_page_token: Option<String>,
}

/// Repository trait for appending and reading aggregate event streams.
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Append new events to an aggregate stream with optimistic concurrency.
    ///
    /// `expected_version` is the version the caller last saw (0 for a new
    /// aggregate). Sequence numbers are assigned by the store. Returns the
    /// events as committed.
    async fn save(
        &self,
        aggregate_type: &str,
        aggregate_id: &str,
        expected_version: i64,
        events: &[NewEvent],
    ) -> Result<Vec<StoredEvent>, DomainError>;

    /// Load all events for an aggregate, ordered by sequence number.
    async fn list(
        &self,
        aggregate_type: &str,
        aggregate_id: &str,
    ) -> Result<Vec<StoredEvent>, DomainError>;

    /// List aggregate summaries in first-appearance order.
    async fn list_aggregates(
        &self,
        criteria: &ListAggregatesCriteria,
    ) -> Result<ListAggregatesResult, DomainError>;

    /// Returns the current version of an aggregate, 0 if it has no events.
    async fn current_version(
        &self,
        aggregate_type: &str,
        aggregate_id: &str,
    ) -> Result<i64, DomainError>;
}

/// Rejects malformed `save` arguments before any storage access.
///
/// # Errors
///
/// Returns `DomainError::Validation` for an empty aggregate type or ID or a
/// negative expected version.
pub fn validate_save(
    aggregate_type: &str,
    aggregate_id: &str,
    expected_version: i64,
) -> Result<(), DomainError> {
    if aggregate_type.trim().is_empty() {
        return Err(DomainError::Validation(
            "aggregate type must not be empty".into(),
        ));
    }
    if aggregate_id.trim().is_empty() {
        return Err(DomainError::Validation(
            "aggregate id must not be empty".into(),
        ));
    }
    if expected_version < 0 {
        return Err(DomainError::Validation(format!(
            "expected version must not be negative, got {expected_version}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_save_accepts_new_aggregate() {
        assert!(validate_save("order", "1", 0).is_ok());
    }

    #[test]
    fn test_validate_save_rejects_blank_type() {
        let result = validate_save("  ", "1", 0);

        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_validate_save_rejects_blank_id() {
        let result = validate_save("order", "", 0);

        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_validate_save_rejects_negative_version() {
        let result = validate_save("order", "1", -1);

        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_criteria_builder() {
        let criteria = ListAggregatesCriteria::default()
            .with_aggregate_type("order")
            .with_per_page(5)
            .with_token(Some("abc".into()));

        assert_eq!(criteria.aggregate_type.as_deref(), Some("order"));
        assert_eq!(criteria.per_page, Some(5));
        assert_eq!(criteria.token.as_deref(), Some("abc"));
    }
}
