//! Postgres-backed event store implementation.
//!
//! Two tables (see `migrations/0001_events.sql`):
//!
//! - `events`: the append-only log, one row per committed event. `payload` holds
//!   the event fields plus `actor` and `recordedAt`; `event_type` has its own column.
//! - `resource_versions`: the current version of every resource.
//!
//! ## Optimistic concurrency
//!
//! A commit runs in one transaction:
//!
//! 1. Bump the version row. For `NoSuchResource` this is an
//!    `INSERT ... ON CONFLICT DO NOTHING`; otherwise an
//!    `UPDATE ... WHERE version = $expected`. Zero affected rows means the
//!    caller's version was stale.
//! 2. Insert the event with `resource_version = expected + 1`.
//!
//! The row lock taken in step 1 serializes racing commits on one resource, and
//! the unique index on `(resource_type, resource_id, resource_version)` rejects
//! anything that slips through.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | EventStoreError |
//! |------------|----------------------|-----------------|
//! | Database (unique violation) on insert | `23505` | `Conflict` |
//! | Database (check constraint violation) | `23514` | `InvalidAppend` |
//! | Database (other) | Any other | `Unavailable` |
//! | Decode / ColumnDecode / ColumnNotFound | N/A | `Corrupt` |
//! | PoolClosed, PoolTimedOut, Io, Tls, other | N/A | `Unavailable` |

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{Span, debug, instrument, warn};
use uuid::Uuid;

use workshop_core::{Resource, ResourceType, ResourceVersion};
use workshop_events::decode::{decode_payload, encode_payload};
use workshop_events::{RecordedEvent, UncommittedEvent};

use super::r#trait::{EventStore, EventStoreError, ResourceEvents};

/// Postgres-backed append-only event store.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct PostgresEventStore {
    pool: Arc<PgPool>,
}

impl PostgresEventStore {
    /// Create a new PostgresEventStore with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Open a pool against `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, EventStoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create the event tables if they don't already exist.
    pub async fn migrate(&self) -> Result<(), EventStoreError> {
        sqlx::migrate!("./migrations")
            .run(&*self.pool)
            .await
            .map_err(|e| EventStoreError::Unavailable(format!("migration failed: {e}")))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Load one resource's events in version order.
    #[instrument(
        skip(self, resource),
        fields(resource = %resource, event_count = tracing::field::Empty),
        err
    )]
    pub async fn load_resource(&self, resource: &Resource) -> Result<ResourceEvents, EventStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT
                id,
                event_id,
                resource_type,
                resource_id,
                resource_version,
                event_type,
                payload
            FROM events
            WHERE resource_type = $1 AND resource_id = $2
            ORDER BY resource_version ASC
            "#,
        )
        .bind(resource.resource_type.as_str())
        .bind(&resource.id)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_resource", e))?;

        let events = rows.iter().map(decode_row).collect::<Result<Vec<_>, _>>()?;
        check_contiguous(resource, &events)?;

        Span::current().record("event_count", events.len());
        Ok(ResourceEvents::from_events(events))
    }

    /// Load every event in commit order.
    #[instrument(skip(self), fields(event_count = tracing::field::Empty), err)]
    pub async fn load_all(&self) -> Result<Vec<RecordedEvent>, EventStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT
                id,
                event_id,
                resource_type,
                resource_id,
                resource_version,
                event_type,
                payload
            FROM events
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_all", e))?;

        let events = rows.iter().map(decode_row).collect::<Result<Vec<_>, _>>()?;
        Span::current().record("event_count", events.len());
        Ok(events)
    }

    /// Append one event if `expected` still matches the stored version.
    #[instrument(
        skip(self, resource, expected, event),
        fields(
            resource = %resource,
            expected = %expected,
            event_type = event.event.event_type().as_str()
        ),
        err
    )]
    pub async fn append(
        &self,
        resource: &Resource,
        expected: ResourceVersion,
        event: UncommittedEvent,
    ) -> Result<RecordedEvent, EventStoreError> {
        let recorded_at = Utc::now();
        let payload = encode_payload(&event.event, &event.actor, recorded_at)
            .map_err(|e| EventStoreError::InvalidAppend(format!("payload serialization failed: {e}")))?;
        let event_id = Uuid::now_v7();
        let version = expected.next();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        if !bump_version(&mut tx, resource, expected).await? {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            let actual = self.current_version(resource).await?;
            warn!(%actual, "stale expected version");
            return Err(EventStoreError::Conflict {
                resource: resource.clone(),
                expected,
                actual,
            });
        }

        let row = sqlx::query(
            r#"
            INSERT INTO events (
                event_id,
                resource_type,
                resource_id,
                resource_version,
                event_type,
                payload
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(event_id)
        .bind(resource.resource_type.as_str())
        .bind(&resource.id)
        .bind(version as i64)
        .bind(event.event.event_type().as_str())
        .bind(&payload)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                EventStoreError::Conflict {
                    resource: resource.clone(),
                    expected,
                    actual: ResourceVersion::Committed(version),
                }
            } else {
                map_sqlx_error("insert_event", e)
            }
        })?;

        let position: i64 = row
            .try_get("id")
            .map_err(|e| map_sqlx_error("insert_event", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        debug!(position, version, "event committed");
        Ok(RecordedEvent {
            event_id,
            resource: resource.clone(),
            version,
            position: position as u64,
            actor: event.actor,
            recorded_at,
            event: event.event,
        })
    }

    async fn current_version(&self, resource: &Resource) -> Result<ResourceVersion, EventStoreError> {
        let row = sqlx::query(
            "SELECT version FROM resource_versions WHERE resource_type = $1 AND resource_id = $2",
        )
        .bind(resource.resource_type.as_str())
        .bind(&resource.id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("current_version", e))?;

        match row {
            None => Ok(ResourceVersion::NoSuchResource),
            Some(row) => {
                let v: i64 = row
                    .try_get("version")
                    .map_err(|e| map_sqlx_error("current_version", e))?;
                Ok(ResourceVersion::from_event_count(v as u64))
            }
        }
    }
}

/// Conditionally advance a resource's version row. Returns `false` when the
/// stored version differs from `expected`.
async fn bump_version(
    tx: &mut Transaction<'_, Postgres>,
    resource: &Resource,
    expected: ResourceVersion,
) -> Result<bool, EventStoreError> {
    let result = match expected {
        ResourceVersion::NoSuchResource => sqlx::query(
            r#"
            INSERT INTO resource_versions (resource_type, resource_id, version)
            VALUES ($1, $2, 1)
            ON CONFLICT (resource_type, resource_id) DO NOTHING
            "#,
        )
        .bind(resource.resource_type.as_str())
        .bind(&resource.id)
        .execute(&mut **tx)
        .await,
        ResourceVersion::Committed(n) => sqlx::query(
            r#"
            UPDATE resource_versions
            SET version = version + 1
            WHERE resource_type = $1 AND resource_id = $2 AND version = $3
            "#,
        )
        .bind(resource.resource_type.as_str())
        .bind(&resource.id)
        .bind(n as i64)
        .execute(&mut **tx)
        .await,
    };

    let result = result.map_err(|e| map_sqlx_error("bump_version", e))?;
    Ok(result.rows_affected() == 1)
}

fn decode_row(row: &PgRow) -> Result<RecordedEvent, EventStoreError> {
    let corrupt = |e: sqlx::Error| EventStoreError::Corrupt(format!("failed to read event row: {e}"));

    let position: i64 = row.try_get("id").map_err(corrupt)?;
    let event_id: Uuid = row.try_get("event_id").map_err(corrupt)?;
    let resource_type: String = row.try_get("resource_type").map_err(corrupt)?;
    let resource_id: String = row.try_get("resource_id").map_err(corrupt)?;
    let version: i64 = row.try_get("resource_version").map_err(corrupt)?;
    let event_type: String = row.try_get("event_type").map_err(corrupt)?;
    let payload: serde_json::Value = row.try_get("payload").map_err(corrupt)?;

    let resource_type: ResourceType = resource_type
        .parse()
        .map_err(|e| EventStoreError::Corrupt(format!("event {event_id}: {e}")))?;
    let decoded = decode_payload(&event_type, &payload)
        .map_err(|e| EventStoreError::Corrupt(format!("event {event_id}: {e}")))?;

    Ok(RecordedEvent {
        event_id,
        resource: Resource::new(resource_type, resource_id),
        version: version as u64,
        position: position as u64,
        actor: decoded.actor,
        recorded_at: decoded.recorded_at,
        event: decoded.event,
    })
}

/// A resource's versions must run 1, 2, 3, ... with no gaps.
fn check_contiguous(resource: &Resource, events: &[RecordedEvent]) -> Result<(), EventStoreError> {
    for (idx, e) in events.iter().enumerate() {
        let expected = idx as u64 + 1;
        if e.version != expected {
            return Err(EventStoreError::Corrupt(format!(
                "{resource}: expected version {expected} at index {idx}, found {}",
                e.version
            )));
        }
    }
    Ok(())
}

/// Map SQLx errors to EventStoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> EventStoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                // Check constraint violation
                Some("23514") => EventStoreError::InvalidAppend(msg),
                _ => EventStoreError::Unavailable(msg),
            }
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_) => {
            EventStoreError::Corrupt(format!("failed to decode row in {operation}: {err}"))
        }
        sqlx::Error::PoolClosed => {
            EventStoreError::Unavailable(format!("connection pool closed in {operation}"))
        }
        _ => EventStoreError::Unavailable(format!("sqlx error in {operation}: {err}")),
    }
}

/// Check if an error is a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        return db_err.code().as_deref() == Some("23505");
    }
    false
}

#[async_trait]
impl EventStore for PostgresEventStore {
    async fn get_resource_events(&self, resource: &Resource) -> Result<ResourceEvents, EventStoreError> {
        self.load_resource(resource).await
    }

    async fn commit_event(
        &self,
        resource: &Resource,
        expected: ResourceVersion,
        event: UncommittedEvent,
    ) -> Result<RecordedEvent, EventStoreError> {
        self.append(resource, expected, event).await
    }

    async fn get_all_events(&self) -> Result<Vec<RecordedEvent>, EventStoreError> {
        self.load_all().await
    }
}
