//! Retention agent that prunes expired events.
//!
//! Each run deletes, oldest first, at most `event.cleanup.limit` event rows
//! recorded before the retention cutoff, then drops the summary rows of
//! aggregates left without events. Both deletes share one transaction.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use chronicle_core::clock::{Clock, SystemClock};
use chronicle_core::config::{CLEANUP_LIMIT_KEY, DynamicConfig};
use chronicle_core::error::DomainError;

/// Static settings for `EventCleanupAgent`.
#[derive(Debug, Clone)]
pub struct CleanupSettings {
    /// Events recorded longer ago than this are eligible for deletion.
    pub retention: TimeDelta,
    /// Per-run delete limit used when the dynamic config has no value.
    pub default_limit: i64,
}

impl Default for CleanupSettings {
    fn default() -> Self {
        Self {
            retention: TimeDelta::days(7),
            default_limit: 1000,
        }
    }
}

/// Outcome of one cleanup run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    /// Events recorded before this instant were eligible.
    pub cutoff: DateTime<Utc>,
    /// Delete limit in force for the run.
    pub limit: i64,
    /// Event rows deleted.
    pub events_deleted: u64,
    /// Aggregates removed because no events were left.
    pub aggregates_deleted: u64,
}

/// Deletes events older than the retention window.
#[derive(Clone)]
pub struct EventCleanupAgent {
    pool: PgPool,
    config: Arc<dyn DynamicConfig>,
    clock: Arc<dyn Clock>,
    settings: CleanupSettings,
}

impl EventCleanupAgent {
    /// Creates an agent using the system clock.
    #[must_use]
    pub fn new(pool: PgPool, config: Arc<dyn DynamicConfig>, settings: CleanupSettings) -> Self {
        Self {
            pool,
            config,
            clock: Arc::new(SystemClock),
            settings,
        }
    }

    /// Replaces the clock used to compute the cutoff.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Performs one cleanup pass.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the retention window cannot be
    /// subtracted from the current time, and `DomainError::Infrastructure` if
    /// reading the limit, either delete or the commit fails; nothing from the
    /// run is then committed.
    #[tracing::instrument(skip(self))]
    pub async fn run(&self) -> Result<CleanupReport, DomainError> {
        let cutoff = self
            .clock
            .now()
            .checked_sub_signed(self.settings.retention)
            .ok_or_else(|| {
                DomainError::Validation(format!(
                    "retention of {} days reaches before the earliest representable time",
                    self.settings.retention.num_days()
                ))
            })?;
        let limit = self
            .config
            .get_int(CLEANUP_LIMIT_KEY, self.settings.default_limit)
            .await?;

        if limit <= 0 {
            tracing::info!(limit, "event cleanup disabled by configuration");
            return Ok(CleanupReport {
                cutoff,
                limit,
                events_deleted: 0,
                aggregates_deleted: 0,
            });
        }

        let mut tx = self.pool.begin().await.map_err(infrastructure)?;

        let events_deleted = sqlx::query(
            r"
            DELETE FROM aggregate_events
            WHERE event_id IN (
                SELECT event_id FROM aggregate_events
                WHERE recorded_at < $1
                ORDER BY recorded_at, aggregate_type, aggregate_id, sequence_number
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            ",
        )
        .bind(cutoff)
        .bind(limit)
        .execute(&mut *tx)
        .await
        .map_err(infrastructure)?
        .rows_affected();

        // A save in flight holds the row lock and moves `last_recorded_at`
        // past the cutoff, so its aggregate fails the recheck and survives.
        let aggregates_deleted = sqlx::query(
            r"
            DELETE FROM event_aggregates a
            WHERE a.last_recorded_at < $1
              AND NOT EXISTS (
                  SELECT 1 FROM aggregate_events e
                  WHERE e.aggregate_type = a.aggregate_type
                    AND e.aggregate_id = a.aggregate_id
              )
            ",
        )
        .bind(cutoff)
        .execute(&mut *tx)
        .await
        .map_err(infrastructure)?
        .rows_affected();

        tx.commit().await.map_err(infrastructure)?;

        tracing::info!(
            %cutoff,
            limit,
            events_deleted,
            aggregates_deleted,
            "event cleanup run finished"
        );
        Ok(CleanupReport {
            cutoff,
            limit,
            events_deleted,
            aggregates_deleted,
        })
    }

    /// Runs the agent every `interval` until `shutdown` flips to `true` or
    /// its sender is dropped. A failed run is logged and the next tick tries
    /// again.
    pub fn spawn(self: Arc<Self>, interval: Duration, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(err) = self.run().await {
                            tracing::error!(error = %err, "event cleanup run failed");
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            tracing::info!("event cleanup scheduler stopped");
                            break;
                        }
                    }
                }
            }
        })
    }
}

impl std::fmt::Debug for EventCleanupAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventCleanupAgent")
            .field("pool", &self.pool)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

fn infrastructure(err: sqlx::Error) -> DomainError {
    DomainError::Infrastructure(err.to_string())
}
