//! Commit notification hook.

use async_trait::async_trait;

use crate::event::StoredEvent;

/// Receives events after the transaction that appended them has committed.
///
/// Listeners are called once per successful save, in registration order.
/// Delivery gives no back-pressure: a slow listener delays the caller of
/// `save` but never the commit itself.
#[async_trait]
pub trait EventListener: Send + Sync {
    /// Called with the events of one committed save, in sequence order.
    ///
    /// # Errors
    ///
    /// Errors are reported by the repository but never undo or fail the save.
    async fn on_events_committed(
        &self,
        events: &[StoredEvent],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
