//! Dynamic configuration abstraction.
//!
//! Values read through this trait may change while the process runs; callers
//! re-read them every time they need them instead of caching.

use async_trait::async_trait;

use crate::error::DomainError;

/// Key holding the maximum number of event rows one cleanup run may delete.
pub const CLEANUP_LIMIT_KEY: &str = "event.cleanup.limit";

/// A source of runtime-tunable settings.
#[async_trait]
pub trait DynamicConfig: Send + Sync {
    /// Returns the integer value stored under `key`, or `default` when the
    /// key is missing or not an integer.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the backing store cannot be
    /// read.
    async fn get_int(&self, key: &str, default: i64) -> Result<i64, DomainError>;
}
