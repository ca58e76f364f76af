//! `PostgreSQL` implementation of the `EventRepository` trait.
//!
//! Writers to the same aggregate are serialized by a row lock on its
//! `event_aggregates` row, taken by an upsert at the start of the save
//! transaction. Writers to other aggregates never wait on each other.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use chronicle_core::clock::{Clock, SystemClock};
use chronicle_core::error::DomainError;
use chronicle_core::event::{EventMetadata, NewEvent, StoredEvent};
use chronicle_core::listener::EventListener;
use chronicle_core::pagination::PageToken;
use chronicle_core::repository::{
    AggregateSummary, EventRepository, ListAggregatesCriteria, ListAggregatesResult,
    validate_save,
};

use crate::schema::SEQUENCE_CONSTRAINT;

/// Tunables for `PgEventRepository`.
#[derive(Debug, Clone, Default)]
pub struct RepositorySettings {
    /// Deadline for each `save`, `list`, `list_aggregates` and
    /// `current_version` call. For `save` it covers the work before COMMIT.
    /// `None` waits indefinitely.
    pub operation_timeout: Option<Duration>,
    /// Written into `EventMetadata::service_version` of every saved event.
    pub service_version: Option<String>,
}

/// PostgreSQL-backed event repository.
#[derive(Clone)]
pub struct PgEventRepository {
    pool: PgPool,
    clock: Arc<dyn Clock>,
    listeners: Vec<Arc<dyn EventListener>>,
    settings: RepositorySettings,
}

impl PgEventRepository {
    /// Creates a new `PgEventRepository` using the system clock.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            clock: Arc::new(SystemClock),
            listeners: Vec::new(),
            settings: RepositorySettings::default(),
        }
    }

    /// Replaces the clock used to stamp `recorded_at`.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Registers a listener informed after every committed save.
    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn EventListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Replaces the repository settings.
    #[must_use]
    pub fn with_settings(mut self, settings: RepositorySettings) -> Self {
        self.settings = settings;
        self
    }

    async fn with_deadline<T, F>(&self, operation: F) -> Result<T, DomainError>
    where
        F: Future<Output = Result<T, DomainError>>,
    {
        match self.settings.operation_timeout {
            Some(limit) => tokio::time::timeout(limit, operation)
                .await
                .map_err(|_| DomainError::Timeout(limit))?,
            None => operation.await,
        }
    }

    /// Does everything a save needs short of committing: locks the
    /// aggregate, checks the version and writes the rows. The caller commits
    /// the returned transaction.
    async fn stage(
        &self,
        aggregate_type: &str,
        aggregate_id: &str,
        expected_version: i64,
        events: &[NewEvent],
    ) -> Result<(Transaction<'static, Postgres>, Vec<StoredEvent>), DomainError> {
        let mut tx = self.pool.begin().await.map_err(infrastructure)?;

        let actual_version =
            lock_aggregate(&mut tx, aggregate_type, aggregate_id, self.clock.now()).await?;
        if actual_version != expected_version {
            // Dropping the transaction rolls back the upsert.
            return Err(conflict(
                aggregate_type,
                aggregate_id,
                expected_version,
                actual_version,
            ));
        }
        // Stamped under the lock so recording order follows sequence order.
        let recorded_at = self.clock.now();

        let committed: Vec<StoredEvent> = (actual_version + 1..)
            .zip(events)
            .map(|(sequence_number, event)| StoredEvent {
                event_id: event.event_id,
                aggregate_type: aggregate_type.to_owned(),
                aggregate_id: aggregate_id.to_owned(),
                sequence_number,
                event_type: event.event_type.clone(),
                payload: event.payload.clone(),
                metadata: EventMetadata {
                    originating_version: expected_version,
                    service_version: self
                        .settings
                        .service_version
                        .clone()
                        .or_else(|| event.metadata.service_version.clone()),
                    ..event.metadata.clone()
                },
                recorded_at,
            })
            .collect();

        for event in &committed {
            sqlx::query(
                r"
                INSERT INTO aggregate_events (
                    event_id, aggregate_type, aggregate_id, sequence_number,
                    event_type, payload, metadata, recorded_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ",
            )
            .bind(event.event_id)
            .bind(&event.aggregate_type)
            .bind(&event.aggregate_id)
            .bind(event.sequence_number)
            .bind(&event.event_type)
            .bind(&event.payload)
            .bind(Json(&event.metadata))
            .bind(event.recorded_at)
            .execute(&mut *tx)
            .await
            .map_err(|err| map_insert_error(err, aggregate_type, aggregate_id, actual_version))?;
        }

        let new_version = committed
            .last()
            .map_or(actual_version, |event| event.sequence_number);
        sqlx::query(
            r"
            UPDATE event_aggregates
            SET version = $3, last_recorded_at = $4
            WHERE aggregate_type = $1 AND aggregate_id = $2
            ",
        )
        .bind(aggregate_type)
        .bind(aggregate_id)
        .bind(new_version)
        .bind(recorded_at)
        .execute(&mut *tx)
        .await
        .map_err(infrastructure)?;

        Ok((tx, committed))
    }

    async fn notify(&self, committed: &[StoredEvent]) {
        for listener in &self.listeners {
            if let Err(err) = listener.on_events_committed(committed).await {
                tracing::warn!(error = %err, "event listener failed after commit");
            }
        }
    }

    async fn fetch_events(
        &self,
        aggregate_type: &str,
        aggregate_id: &str,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        let rows: Vec<EventRow> = sqlx::query_as(
            r"
            SELECT event_id, aggregate_type, aggregate_id, sequence_number,
                   event_type, payload, metadata, recorded_at
            FROM aggregate_events
            WHERE aggregate_type = $1 AND aggregate_id = $2
            ORDER BY sequence_number ASC
            ",
        )
        .bind(aggregate_type)
        .bind(aggregate_id)
        .fetch_all(&self.pool)
        .await
        .map_err(infrastructure)?;

        Ok(rows.into_iter().map(StoredEvent::from).collect())
    }

    async fn fetch_aggregates(
        &self,
        criteria: &ListAggregatesCriteria,
    ) -> Result<ListAggregatesResult, DomainError> {
        if criteria.per_page == Some(0) {
            return Err(DomainError::Validation(
                "per_page must be greater than zero".into(),
            ));
        }
        let filter = criteria.aggregate_type.as_deref();
        let after_position = match criteria.token.as_deref() {
            Some(raw) => {
                let token = PageToken::decode(raw)?;
                token.ensure_filter(filter)?;
                token.position
            }
            None => 0,
        };
        // One extra row tells whether another page follows.
        let fetch_limit = criteria.per_page.map(|per_page| i64::from(per_page) + 1);

        let mut rows: Vec<SummaryRow> = sqlx::query_as(
            r"
            SELECT aggregate_type, aggregate_id, version, position
            FROM event_aggregates
            WHERE position > $1
              AND ($2::VARCHAR IS NULL OR aggregate_type = $2)
            ORDER BY position ASC
            LIMIT $3
            ",
        )
        .bind(after_position)
        .bind(filter)
        .bind(fetch_limit)
        .fetch_all(&self.pool)
        .await
        .map_err(infrastructure)?;

        let mut next_page_token = None;
        if let Some(per_page) = criteria.per_page {
            let per_page = usize::try_from(per_page).unwrap_or(usize::MAX);
            if rows.len() > per_page {
                rows.truncate(per_page);
                next_page_token = rows
                    .last()
                    .map(|last| PageToken::new(filter, last.position).encode());
            }
        }

        Ok(ListAggregatesResult {
            aggregates: rows.into_iter().map(AggregateSummary::from).collect(),
            next_page_token,
        })
    }

    async fn fetch_version(
        &self,
        aggregate_type: &str,
        aggregate_id: &str,
    ) -> Result<i64, DomainError> {
        let version: Option<i64> = sqlx::query_scalar(
            r"
            SELECT version FROM event_aggregates
            WHERE aggregate_type = $1 AND aggregate_id = $2
            ",
        )
        .bind(aggregate_type)
        .bind(aggregate_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(infrastructure)?;

        Ok(version.unwrap_or(0))
    }
}

impl std::fmt::Debug for PgEventRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgEventRepository")
            .field("pool", &self.pool)
            .field("listeners", &self.listeners.len())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl EventRepository for PgEventRepository {
    #[tracing::instrument(skip(self, events), fields(event_count = events.len()))]
    async fn save(
        &self,
        aggregate_type: &str,
        aggregate_id: &str,
        expected_version: i64,
        events: &[NewEvent],
    ) -> Result<Vec<StoredEvent>, DomainError> {
        validate_save(aggregate_type, aggregate_id, expected_version)?;
        if events.is_empty() {
            return Ok(Vec::new());
        }

        // The deadline stops at COMMIT: once the commit is sent its outcome
        // is awaited, so a reported timeout always means nothing was written.
        let (tx, committed) = self
            .with_deadline(self.stage(aggregate_type, aggregate_id, expected_version, events))
            .await?;
        tx.commit().await.map_err(infrastructure)?;
        tracing::debug!(
            aggregate_type,
            aggregate_id,
            from_version = expected_version,
            to_version = committed.last().map_or(expected_version, |e| e.sequence_number),
            "appended events"
        );
        self.notify(&committed).await;
        Ok(committed)
    }

    #[tracing::instrument(skip(self))]
    async fn list(
        &self,
        aggregate_type: &str,
        aggregate_id: &str,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        self.with_deadline(self.fetch_events(aggregate_type, aggregate_id))
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn list_aggregates(
        &self,
        criteria: &ListAggregatesCriteria,
    ) -> Result<ListAggregatesResult, DomainError> {
        self.with_deadline(self.fetch_aggregates(criteria)).await
    }

    #[tracing::instrument(skip(self))]
    async fn current_version(
        &self,
        aggregate_type: &str,
        aggregate_id: &str,
    ) -> Result<i64, DomainError> {
        self.with_deadline(self.fetch_version(aggregate_type, aggregate_id))
            .await
    }
}

/// Creates the aggregate row if needed, locks it for the rest of the
/// transaction and returns its current version.
///
/// `ON CONFLICT DO UPDATE` takes the row lock in the same statement, so a
/// concurrent delete of the row by the cleanup agent makes Postgres retry
/// the insert instead of returning nothing.
async fn lock_aggregate(
    tx: &mut Transaction<'_, Postgres>,
    aggregate_type: &str,
    aggregate_id: &str,
    now: DateTime<Utc>,
) -> Result<i64, DomainError> {
    sqlx::query_scalar(
        r"
        INSERT INTO event_aggregates (
            aggregate_type, aggregate_id, version, created_at, last_recorded_at
        )
        VALUES ($1, $2, 0, $3, $3)
        ON CONFLICT (aggregate_type, aggregate_id)
        DO UPDATE SET version = event_aggregates.version
        RETURNING version
        ",
    )
    .bind(aggregate_type)
    .bind(aggregate_id)
    .bind(now)
    .fetch_one(&mut **tx)
    .await
    .map_err(infrastructure)
}

fn conflict(aggregate_type: &str, aggregate_id: &str, expected: i64, actual: i64) -> DomainError {
    DomainError::ConcurrencyConflict {
        aggregate_type: aggregate_type.to_owned(),
        aggregate_id: aggregate_id.to_owned(),
        expected,
        actual,
    }
}

fn infrastructure(err: sqlx::Error) -> DomainError {
    DomainError::Infrastructure(err.to_string())
}

fn map_insert_error(
    err: sqlx::Error,
    aggregate_type: &str,
    aggregate_id: &str,
    version: i64,
) -> DomainError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            if db_err.constraint() == Some(SEQUENCE_CONSTRAINT) {
                // Only reachable if a writer bypassed the aggregate lock.
                return conflict(aggregate_type, aggregate_id, version, version);
            }
            return DomainError::Validation(format!("duplicate event id: {db_err}"));
        }
    }
    infrastructure(err)
}

#[derive(sqlx::FromRow)]
struct EventRow {
    event_id: Uuid,
    aggregate_type: String,
    aggregate_id: String,
    sequence_number: i64,
    event_type: String,
    payload: serde_json::Value,
    metadata: Json<EventMetadata>,
    recorded_at: DateTime<Utc>,
}

impl From<EventRow> for StoredEvent {
    fn from(row: EventRow) -> Self {
        Self {
            event_id: row.event_id,
            aggregate_type: row.aggregate_type,
            aggregate_id: row.aggregate_id,
            sequence_number: row.sequence_number,
            event_type: row.event_type,
            payload: row.payload,
            metadata: row.metadata.0,
            recorded_at: row.recorded_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SummaryRow {
    aggregate_type: String,
    aggregate_id: String,
    version: i64,
    position: i64,
}

impl From<SummaryRow> for AggregateSummary {
    fn from(row: SummaryRow) -> Self {
        Self {
            aggregate_type: row.aggregate_type,
            aggregate_id: row.aggregate_id,
            version: row.version,
        }
    }
}
