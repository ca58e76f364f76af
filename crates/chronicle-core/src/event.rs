//! Event model: what callers append and what the store hands back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata persisted alongside every event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Correlation ID for tracing a request through its effects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<Uuid>,
    /// Causation ID linking this event to the event/command that caused it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub causation_id: Option<Uuid>,
    /// Aggregate version the append was made against. Set by the store.
    #[serde(default)]
    pub originating_version: i64,
    /// Version of the service that wrote the event. Set by the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_version: Option<String>,
}

/// An event handed to `EventRepository::save`.
///
/// Sequence number and recording time are assigned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Type tag used to route deserialization.
    pub event_type: String,
    /// Serialized event payload.
    pub payload: serde_json::Value,
    /// Caller-supplied metadata.
    pub metadata: EventMetadata,
}

impl NewEvent {
    /// Creates a new event with a fresh time-ordered ID and empty metadata.
    #[must_use]
    pub fn new(event_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            event_type: event_type.into(),
            payload,
            metadata: EventMetadata::default(),
        }
    }

    /// Sets the correlation ID, which also becomes the causation ID when none
    /// is set.
    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.metadata.correlation_id = Some(correlation_id);
        self.metadata.causation_id.get_or_insert(correlation_id);
        self
    }
}

/// Stored representation of an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Type of the aggregate this event belongs to.
    pub aggregate_type: String,
    /// Identifier of the aggregate this event belongs to.
    pub aggregate_id: String,
    /// Position within the aggregate stream, starting at 1.
    pub sequence_number: i64,
    /// Type tag used to route deserialization.
    pub event_type: String,
    /// Serialized event payload.
    pub payload: serde_json::Value,
    /// Event metadata.
    pub metadata: EventMetadata,
    /// When the store recorded the event.
    pub recorded_at: DateTime<Utc>,
}

/// Trait that all typed domain events implement.
pub trait DomainEvent: Send + Sync + std::fmt::Debug {
    /// Returns the event type tag (used for deserialization routing).
    fn event_type(&self) -> &'static str;

    /// Serializes the event payload to JSON.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if the payload cannot be represented
    /// as JSON.
    fn to_payload(&self) -> serde_json::Result<serde_json::Value>;
}
