//! `DynamicConfig` backed by the `dynamic_config` table.
//!
//! Every read goes to the database, so a value written by an operator (or
//! through [`PgDynamicConfig::set_int`]) applies to the next read without a
//! restart.

use async_trait::async_trait;
use sqlx::PgPool;

use chronicle_core::config::DynamicConfig;
use chronicle_core::error::DomainError;

/// Reads settings from the `dynamic_config` table.
#[derive(Debug, Clone)]
pub struct PgDynamicConfig {
    pool: PgPool,
}

impl PgDynamicConfig {
    /// Creates a config reader over `pool`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for an empty key and
    /// `DomainError::Infrastructure` if the write fails.
    #[tracing::instrument(skip(self))]
    pub async fn set_int(&self, key: &str, value: i64) -> Result<(), DomainError> {
        if key.trim().is_empty() {
            return Err(DomainError::Validation("config key must not be empty".into()));
        }
        sqlx::query(
            r"
            INSERT INTO dynamic_config (key, value, updated_at)
            VALUES ($1, $2, now())
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = now()
            ",
        )
        .bind(key)
        .bind(value.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::Infrastructure(e.to_string()))?;

        tracing::info!(key, value, "dynamic config updated");
        Ok(())
    }
}

#[async_trait]
impl DynamicConfig for PgDynamicConfig {
    async fn get_int(&self, key: &str, default: i64) -> Result<i64, DomainError> {
        let raw: Option<String> =
            sqlx::query_scalar("SELECT value FROM dynamic_config WHERE key = $1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| DomainError::Infrastructure(e.to_string()))?;

        Ok(match raw {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                tracing::warn!(key, %raw, "ignoring non-integer dynamic config value");
                default
            }),
            None => default,
        })
    }
}
