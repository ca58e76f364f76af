//! Test configuration: an in-memory `DynamicConfig`.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chronicle_core::config::DynamicConfig;
use chronicle_core::error::DomainError;

/// A dynamic configuration backed by a map that tests can change between
/// reads. Also counts how often each key was read.
#[derive(Debug, Default)]
pub struct StaticConfig {
    values: Mutex<HashMap<String, i64>>,
    reads: Mutex<HashMap<String, usize>>,
}

impl StaticConfig {
    /// Create a configuration holding a single integer value.
    #[must_use]
    pub fn with_int(key: &str, value: i64) -> Self {
        let config = Self::default();
        config.set_int(key, value);
        config
    }

    /// Set or replace an integer value.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn set_int(&self, key: &str, value: i64) {
        self.values.lock().unwrap().insert(key.to_owned(), value);
    }

    /// Number of times `key` has been read.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn reads(&self, key: &str) -> usize {
        self.reads.lock().unwrap().get(key).copied().unwrap_or(0)
    }
}

#[async_trait]
impl DynamicConfig for StaticConfig {
    async fn get_int(&self, key: &str, default: i64) -> Result<i64, DomainError> {
        *self.reads.lock().unwrap().entry(key.to_owned()).or_default() += 1;
        Ok(self
            .values
            .lock()
            .unwrap()
            .get(key)
            .copied()
            .unwrap_or(default))
    }
}
