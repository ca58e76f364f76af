//! Server configuration read from the environment.

use std::time::Duration;

use chrono::TimeDelta;

use crate::error::AppError;

/// Longest accepted `EVENT_RETENTION_DAYS`, one hundred years.
pub const MAX_RETENTION_DAYS: i64 = 36_500;

/// Startup configuration for the API server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// PostgreSQL connection string.
    pub database_url: String,
    /// Interface to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// Upper bound on pooled database connections.
    pub max_connections: u32,
    /// Events older than this are removed by the cleanup agent.
    pub retention: TimeDelta,
    /// Cleanup limit used until `event.cleanup.limit` is set in the
    /// `dynamic_config` table.
    pub cleanup_default_limit: i64,
    /// Delay between scheduled cleanup runs.
    pub cleanup_interval: Duration,
    /// Deadline applied to each repository operation.
    pub operation_timeout: Option<Duration>,
    /// OTLP collector endpoint; spans are only exported when set.
    pub otlp_endpoint: Option<String>,
}

impl AppConfig {
    /// Reads the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `DATABASE_URL` is missing, a numeric
    /// variable does not parse or `EVENT_RETENTION_DAYS` is outside
    /// `0..=MAX_RETENTION_DAYS`.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, which returns the raw value
    /// of a variable if it is set.
    ///
    /// # Errors
    ///
    /// See [`AppConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").ok_or_else(|| {
            AppError::Config("DATABASE_URL environment variable must be set".to_owned())
        })?;
        let retention_days: i64 = parse_or(&lookup, "EVENT_RETENTION_DAYS", 7)?;
        let retention = (0..=MAX_RETENTION_DAYS)
            .contains(&retention_days)
            .then(|| TimeDelta::try_days(retention_days))
            .flatten()
            .ok_or_else(|| {
                AppError::Config(format!(
                    "EVENT_RETENTION_DAYS must be between 0 and {MAX_RETENTION_DAYS}, got {retention_days}"
                ))
            })?;

        Ok(Self {
            database_url,
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_owned()),
            port: parse_or(&lookup, "PORT", 3000)?,
            max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
            retention,
            cleanup_default_limit: parse_or(&lookup, "EVENT_CLEANUP_LIMIT", 1000)?,
            cleanup_interval: Duration::from_secs(parse_or(
                &lookup,
                "EVENT_CLEANUP_INTERVAL_SECS",
                3600,
            )?),
            operation_timeout: parse_optional(&lookup, "EVENT_OPERATION_TIMEOUT_MS")?
                .map(Duration::from_millis),
            otlp_endpoint: lookup("OTEL_EXPORTER_OTLP_ENDPOINT").filter(|v| !v.is_empty()),
        })
    }
}

fn parse_optional<F, T>(lookup: &F, key: &str) -> Result<Option<T>, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| AppError::Config(format!("{key} is invalid: {e}")))
        })
        .transpose()
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    Ok(parse_optional(lookup, key)?.unwrap_or(default))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_apply_when_only_database_url_is_set() {
        // Arrange / Act
        let config =
            AppConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://db/chronicle")])).unwrap();

        // Assert
        assert_eq!(config.database_url, "postgres://db/chronicle");
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.retention, TimeDelta::days(7));
        assert_eq!(config.cleanup_default_limit, 1000);
        assert_eq!(config.cleanup_interval, Duration::from_secs(3600));
        assert_eq!(config.operation_timeout, None);
        assert_eq!(config.otlp_endpoint, None);
    }

    #[test]
    fn test_overrides_are_parsed() {
        let config = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://db/chronicle"),
            ("HOST", "127.0.0.1"),
            ("PORT", "8080"),
            ("DATABASE_MAX_CONNECTIONS", "4"),
            ("EVENT_RETENTION_DAYS", "30"),
            ("EVENT_CLEANUP_INTERVAL_SECS", "60"),
            ("EVENT_CLEANUP_LIMIT", "250"),
            ("EVENT_OPERATION_TIMEOUT_MS", "1500"),
            ("OTEL_EXPORTER_OTLP_ENDPOINT", "http://collector:4317"),
        ]))
        .unwrap();

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.max_connections, 4);
        assert_eq!(config.retention, TimeDelta::days(30));
        assert_eq!(config.cleanup_default_limit, 250);
        assert_eq!(config.cleanup_interval, Duration::from_secs(60));
        assert_eq!(config.operation_timeout, Some(Duration::from_millis(1500)));
        assert_eq!(config.otlp_endpoint.as_deref(), Some("http://collector:4317"));
    }

    #[test]
    fn test_missing_database_url_is_rejected() {
        let result = AppConfig::from_lookup(lookup(&[]));

        assert!(matches!(result, Err(AppError::Config(msg)) if msg.contains("DATABASE_URL")));
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let result = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://db/chronicle"),
            ("PORT", "eighty"),
        ]));

        assert!(matches!(result, Err(AppError::Config(msg)) if msg.contains("PORT")));
    }

    #[test]
    fn test_negative_retention_is_rejected() {
        let result = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://db/chronicle"),
            ("EVENT_RETENTION_DAYS", "-1"),
        ]));

        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_empty_otlp_endpoint_counts_as_unset() {
        let config = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://db/chronicle"),
            ("OTEL_EXPORTER_OTLP_ENDPOINT", ""),
        ]))
        .unwrap();

        assert_eq!(config.otlp_endpoint, None);
    }

    #[test]
    fn test_retention_beyond_maximum_is_rejected() {
        for raw in ["36501", "100000000", "9223372036854775807"] {
            let result = AppConfig::from_lookup(lookup(&[
                ("DATABASE_URL", "postgres://db/chronicle"),
                ("EVENT_RETENTION_DAYS", raw),
            ]));

            assert!(
                matches!(result, Err(AppError::Config(ref msg)) if msg.contains("EVENT_RETENTION_DAYS")),
                "{raw} was accepted"
            );
        }
    }

    #[test]
    fn test_maximum_retention_is_accepted() {
        let config = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://db/chronicle"),
            ("EVENT_RETENTION_DAYS", "36500"),
        ]))
        .unwrap();

        assert_eq!(config.retention, TimeDelta::days(MAX_RETENTION_DAYS));
    }
}
