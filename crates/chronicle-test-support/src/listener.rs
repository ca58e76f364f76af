//! Test listeners: `EventListener` implementations for tests.

use std::sync::Mutex;

use async_trait::async_trait;
use chronicle_core::event::StoredEvent;
use chronicle_core::listener::EventListener;

/// A listener that records every batch it is notified with.
#[derive(Debug, Default)]
pub struct RecordingListener {
    batches: Mutex<Vec<Vec<StoredEvent>>>,
}

impl RecordingListener {
    /// Returns a snapshot of all notified batches.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn batches(&self) -> Vec<Vec<StoredEvent>> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventListener for RecordingListener {
    async fn on_events_committed(
        &self,
        events: &[StoredEvent],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.batches.lock().unwrap().push(events.to_vec());
        Ok(())
    }
}

/// A listener that always fails. Useful for checking that listener errors do
/// not leak into the save result.
#[derive(Debug)]
pub struct FailingListener;

#[async_trait]
impl EventListener for FailingListener {
    async fn on_events_committed(
        &self,
        _events: &[StoredEvent],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Err("listener unavailable".into())
    }
}
