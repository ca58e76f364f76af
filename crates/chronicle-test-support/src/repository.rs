//! Test repositories: mock `EventRepository` implementations for tests.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chronicle_core::error::DomainError;
use chronicle_core::event::{NewEvent, StoredEvent};
use chronicle_core::repository::{EventRepository, ListAggregatesCriteria, ListAggregatesResult};

/// A single recorded `save` call: aggregate type, aggregate ID, expected
/// version and the events handed in.
pub type SaveCall = (String, String, i64, Vec<NewEvent>);

/// An event repository that records all `save` calls. Returns the configured
/// events from every `list` call and always accepts saves, numbering the
/// committed events from `expected_version + 1`.
#[derive(Debug)]
pub struct RecordingEventRepository {
    list_result: Mutex<Vec<StoredEvent>>,
    saved: Mutex<Vec<SaveCall>>,
}

impl RecordingEventRepository {
    /// Create a new recording repository that will return `list_result` from
    /// every `list` call.
    #[must_use]
    pub fn new(list_result: Vec<StoredEvent>) -> Self {
        Self {
            list_result: Mutex::new(list_result),
            saved: Mutex::new(Vec::new()),
        }
    }

    /// Returns a snapshot of all `save` calls.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn saved(&self) -> Vec<SaveCall> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventRepository for RecordingEventRepository {
    async fn save(
        &self,
        aggregate_type: &str,
        aggregate_id: &str,
        expected_version: i64,
        events: &[NewEvent],
    ) -> Result<Vec<StoredEvent>, DomainError> {
        self.saved.lock().unwrap().push((
            aggregate_type.to_owned(),
            aggregate_id.to_owned(),
            expected_version,
            events.to_vec(),
        ));
        Ok((expected_version + 1..)
            .zip(events)
            .map(|(sequence_number, event)| StoredEvent {
                event_id: event.event_id,
                aggregate_type: aggregate_type.to_owned(),
                aggregate_id: aggregate_id.to_owned(),
                sequence_number,
                event_type: event.event_type.clone(),
                payload: event.payload.clone(),
                metadata: event.metadata.clone(),
                recorded_at: DateTime::<Utc>::UNIX_EPOCH,
            })
            .collect())
    }

    async fn list(
        &self,
        _aggregate_type: &str,
        _aggregate_id: &str,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(self.list_result.lock().unwrap().clone())
    }

    async fn list_aggregates(
        &self,
        _criteria: &ListAggregatesCriteria,
    ) -> Result<ListAggregatesResult, DomainError> {
        Ok(ListAggregatesResult::default())
    }

    async fn current_version(
        &self,
        _aggregate_type: &str,
        _aggregate_id: &str,
    ) -> Result<i64, DomainError> {
        Ok(self
            .list_result
            .lock()
            .unwrap()
            .last()
            .map_or(0, |event| event.sequence_number))
    }
}

/// An event repository that always returns empty results and silently
/// accepts saves.
#[derive(Debug)]
pub struct EmptyEventRepository;

#[async_trait]
impl EventRepository for EmptyEventRepository {
    async fn save(
        &self,
        _aggregate_type: &str,
        _aggregate_id: &str,
        _expected_version: i64,
        _events: &[NewEvent],
    ) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(vec![])
    }

    async fn list(
        &self,
        _aggregate_type: &str,
        _aggregate_id: &str,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(vec![])
    }

    async fn list_aggregates(
        &self,
        _criteria: &ListAggregatesCriteria,
    ) -> Result<ListAggregatesResult, DomainError> {
        Ok(ListAggregatesResult::default())
    }

    async fn current_version(
        &self,
        _aggregate_type: &str,
        _aggregate_id: &str,
    ) -> Result<i64, DomainError> {
        Ok(0)
    }
}

/// An event repository that always returns an infrastructure error. Useful for
/// testing error-handling paths.
#[derive(Debug)]
pub struct FailingEventRepository;

#[async_trait]
impl EventRepository for FailingEventRepository {
    async fn save(
        &self,
        _aggregate_type: &str,
        _aggregate_id: &str,
        _expected_version: i64,
        _events: &[NewEvent],
    ) -> Result<Vec<StoredEvent>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn list(
        &self,
        _aggregate_type: &str,
        _aggregate_id: &str,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn list_aggregates(
        &self,
        _criteria: &ListAggregatesCriteria,
    ) -> Result<ListAggregatesResult, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn current_version(
        &self,
        _aggregate_type: &str,
        _aggregate_id: &str,
    ) -> Result<i64, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }
}
