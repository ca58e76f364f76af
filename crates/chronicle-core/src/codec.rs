//! Serialization codec for typed events.
//!
//! An [`EventRegistry`] maps type tags to decoder functions. It is built once
//! at startup and handed to an [`EventCodec`]; nothing is registered
//! globally, so independently configured stores can share a process.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::error::DomainError;
use crate::event::DomainEvent;

/// Errors raised while encoding or decoding an event.
#[derive(Debug, Error)]
pub enum CodecError {
    /// No decoder is registered for the type tag.
    #[error("unknown event type: {0}")]
    UnknownEventType(String),

    /// The payload could not be converted.
    #[error("malformed payload for event type {event_type}: {source}")]
    Payload {
        /// Type tag of the offending event.
        event_type: String,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },
}

impl From<CodecError> for DomainError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::UnknownEventType(tag) => Self::UnknownEventType(tag),
            CodecError::Payload { event_type, source } => Self::Infrastructure(format!(
                "malformed payload for event type {event_type}: {source}"
            )),
        }
    }
}

type Decoder<E> = Arc<dyn Fn(serde_json::Value) -> serde_json::Result<E> + Send + Sync>;

/// Mapping from type tag to decoder for the event type `E`.
pub struct EventRegistry<E> {
    decoders: HashMap<String, Decoder<E>>,
}

impl<E> EventRegistry<E> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Registers a decoder function for `event_type`, replacing any earlier
    /// registration for the same tag.
    #[must_use]
    pub fn register<F>(mut self, event_type: impl Into<String>, decoder: F) -> Self
    where
        F: Fn(serde_json::Value) -> serde_json::Result<E> + Send + Sync + 'static,
    {
        self.decoders.insert(event_type.into(), Arc::new(decoder));
        self
    }

    /// Registers `T` as the payload type for `event_type`; decoded values are
    /// converted into `E`.
    #[must_use]
    pub fn register_type<T>(self, event_type: impl Into<String>) -> Self
    where
        T: DeserializeOwned + Into<E> + 'static,
        E: 'static,
    {
        self.register(event_type, |payload| {
            serde_json::from_value::<T>(payload).map(Into::into)
        })
    }

    /// Returns `true` if a decoder is registered for `event_type`.
    #[must_use]
    pub fn contains(&self, event_type: &str) -> bool {
        self.decoders.contains_key(event_type)
    }

    /// Number of registered type tags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }
}

impl<E> Default for EventRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for EventRegistry<E> {
    fn clone(&self) -> Self {
        Self {
            decoders: self.decoders.clone(),
        }
    }
}

impl<E> fmt::Debug for EventRegistry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<&str> = self.decoders.keys().map(String::as_str).collect();
        tags.sort_unstable();
        f.debug_struct("EventRegistry").field("tags", &tags).finish()
    }
}

/// A typed event in its persisted form.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedEvent {
    /// Type tag.
    pub event_type: String,
    /// Serialized payload.
    pub payload: serde_json::Value,
}

/// Converts typed events to and from `(type tag, payload)` pairs.
#[derive(Debug, Clone)]
pub struct EventCodec<E> {
    registry: EventRegistry<E>,
}

impl<E> EventCodec<E> {
    /// Creates a codec backed by `registry`.
    #[must_use]
    pub fn new(registry: EventRegistry<E>) -> Self {
        Self { registry }
    }

    /// Returns the registry this codec decodes with.
    #[must_use]
    pub fn registry(&self) -> &EventRegistry<E> {
        &self.registry
    }
}

impl<E: DomainEvent> EventCodec<E> {
    /// Serializes `event`.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::UnknownEventType` if the event's tag is not
    /// registered (it could never be read back), or `CodecError::Payload` if
    /// the payload cannot be serialized.
    pub fn serialize(&self, event: &E) -> Result<EncodedEvent, CodecError> {
        let event_type = event.event_type();
        if !self.registry.contains(event_type) {
            return Err(CodecError::UnknownEventType(event_type.to_owned()));
        }
        let payload = event.to_payload().map_err(|source| CodecError::Payload {
            event_type: event_type.to_owned(),
            source,
        })?;
        Ok(EncodedEvent {
            event_type: event_type.to_owned(),
            payload,
        })
    }

    /// Deserializes a payload recorded under `event_type`.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::UnknownEventType` if no decoder is registered for
    /// the tag, or `CodecError::Payload` if the decoder rejects the payload.
    pub fn deserialize(&self, event_type: &str, payload: serde_json::Value) -> Result<E, CodecError> {
        let decoder = self
            .registry
            .decoders
            .get(event_type)
            .ok_or_else(|| CodecError::UnknownEventType(event_type.to_owned()))?;
        decoder(payload).map_err(|source| CodecError::Payload {
            event_type: event_type.to_owned(),
            source,
        })
    }
}
