//! Typed facade over an `EventRepository`.
//!
//! Serializes domain events through an [`EventCodec`] on the way in and
//! decodes them on the way out. What happens to records whose type tag is
//! not registered is decided by an explicit [`UnknownEventPolicy`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::codec::{CodecError, EventCodec};
use crate::error::DomainError;
use crate::event::{DomainEvent, EventMetadata, NewEvent, StoredEvent};
use crate::repository::{EventRepository, ListAggregatesCriteria, ListAggregatesResult};

/// What to do with a stored event whose type tag has no decoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnknownEventPolicy {
    /// Fail the whole read with `DomainError::UnknownEventType`.
    #[default]
    Fail,
    /// Log a warning and leave the record out of the result.
    Skip,
}

/// A decoded event together with its stream position.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEvent<E> {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Position within the aggregate stream.
    pub sequence_number: i64,
    /// When the store recorded the event.
    pub recorded_at: DateTime<Utc>,
    /// Event metadata.
    pub metadata: EventMetadata,
    /// The decoded event.
    pub event: E,
}

/// Typed event store for one family of domain events.
pub struct EventStore<E> {
    repository: Arc<dyn EventRepository>,
    codec: EventCodec<E>,
    unknown_event_policy: UnknownEventPolicy,
}

impl<E: DomainEvent> EventStore<E> {
    /// Creates a store that fails on unknown event types.
    #[must_use]
    pub fn new(repository: Arc<dyn EventRepository>, codec: EventCodec<E>) -> Self {
        Self {
            repository,
            codec,
            unknown_event_policy: UnknownEventPolicy::default(),
        }
    }

    /// Overrides the unknown event policy.
    #[must_use]
    pub fn with_unknown_event_policy(mut self, policy: UnknownEventPolicy) -> Self {
        self.unknown_event_policy = policy;
        self
    }

    /// Serializes and appends `events`, returning the new aggregate version.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::UnknownEventType` if an event kind is not
    /// registered with the codec, and whatever the repository returns,
    /// notably `DomainError::ConcurrencyConflict`.
    pub async fn save(
        &self,
        aggregate_type: &str,
        aggregate_id: &str,
        expected_version: i64,
        events: &[E],
        correlation_id: Option<Uuid>,
    ) -> Result<i64, DomainError> {
        let new_events = events
            .iter()
            .map(|event| {
                let encoded = self.codec.serialize(event)?;
                let new_event = NewEvent::new(encoded.event_type, encoded.payload);
                Ok(match correlation_id {
                    Some(id) => new_event.with_correlation_id(id),
                    None => new_event,
                })
            })
            .collect::<Result<Vec<_>, CodecError>>()?;

        let committed = self
            .repository
            .save(aggregate_type, aggregate_id, expected_version, &new_events)
            .await?;

        Ok(committed
            .last()
            .map_or(expected_version, |event| event.sequence_number))
    }

    /// Loads and decodes the events of an aggregate in sequence order.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::UnknownEventType` under
    /// `UnknownEventPolicy::Fail`, `DomainError::Infrastructure` for a
    /// malformed payload, and any repository error.
    pub async fn load(
        &self,
        aggregate_type: &str,
        aggregate_id: &str,
    ) -> Result<Vec<RecordedEvent<E>>, DomainError> {
        let stored = self.repository.list(aggregate_type, aggregate_id).await?;
        let mut decoded = Vec::with_capacity(stored.len());
        for event in stored {
            if let Some(recorded) = self.decode(event)? {
                decoded.push(recorded);
            }
        }
        Ok(decoded)
    }

    /// Lists aggregate summaries; see `EventRepository::list_aggregates`.
    ///
    /// # Errors
    ///
    /// Returns any repository error.
    pub async fn list_aggregates(
        &self,
        criteria: &ListAggregatesCriteria,
    ) -> Result<ListAggregatesResult, DomainError> {
        self.repository.list_aggregates(criteria).await
    }

    fn decode(&self, stored: StoredEvent) -> Result<Option<RecordedEvent<E>>, DomainError> {
        match self.codec.deserialize(&stored.event_type, stored.payload) {
            Ok(event) => Ok(Some(RecordedEvent {
                event_id: stored.event_id,
                sequence_number: stored.sequence_number,
                recorded_at: stored.recorded_at,
                metadata: stored.metadata,
                event,
            })),
            Err(CodecError::UnknownEventType(tag))
                if self.unknown_event_policy == UnknownEventPolicy::Skip =>
            {
                tracing::warn!(
                    aggregate_type = %stored.aggregate_type,
                    aggregate_id = %stored.aggregate_id,
                    sequence_number = stored.sequence_number,
                    event_type = %tag,
                    "skipping event with unregistered type"
                );
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }
}

impl<E> std::fmt::Debug for EventStore<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStore")
            .field("registry", self.codec.registry())
            .field("unknown_event_policy", &self.unknown_event_policy)
            .finish_non_exhaustive()
    }
}
