use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use workshop_core::{Resource, ResourceVersion};
use workshop_events::{DecodeError, DomainEvent, RecordedEvent, UncommittedEvent};

/// The committed history of one resource plus its current version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceEvents {
    pub events: Vec<RecordedEvent>,
    pub version: ResourceVersion,
}

impl ResourceEvents {
    pub fn empty() -> Self {
        Self {
            events: Vec::new(),
            version: ResourceVersion::NoSuchResource,
        }
    }

    /// Build from an ordered history; the version is the event count.
    pub fn from_events(events: Vec<RecordedEvent>) -> Self {
        let version = ResourceVersion::from_event_count(events.len() as u64);
        Self { events, version }
    }

    /// Domain payloads only, in commit order.
    pub fn payloads(&self) -> Vec<DomainEvent> {
        workshop_events::payloads(&self.events)
    }
}

/// Event store operation error.
///
/// - **Conflict**: the expected version was stale. Re-read and decide again.
/// - **Unavailable**: I/O or connectivity failure. Retry with backoff.
/// - **Corrupt**: a persisted row failed to decode. Retrying cannot help.
/// - **InvalidAppend**: the event could not be written in its current form.
#[derive(Debug, Error)]
pub enum EventStoreError {
    #[error("version conflict on {resource}: expected {expected}, found {actual}")]
    Conflict {
        resource: Resource,
        expected: ResourceVersion,
        actual: ResourceVersion,
    },

    #[error("event store unavailable: {0}")]
    Unavailable(String),

    #[error("corrupt event data: {0}")]
    Corrupt(String),

    #[error("invalid append: {0}")]
    InvalidAppend(String),
}

impl EventStoreError {
    /// Whether re-running the command from a fresh read may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EventStoreError::Conflict { .. } | EventStoreError::Unavailable(_)
        )
    }
}

impl From<DecodeError> for EventStoreError {
    fn from(value: DecodeError) -> Self {
        EventStoreError::Corrupt(value.to_string())
    }
}

/// Append-only, per-resource versioned event log.
///
/// ## Commit semantics
///
/// `commit_event` compares `expected` with the stored version and appends in one
/// atomic step. Two commits racing with the same expected version produce
/// exactly one success; the other gets `Conflict` and nothing is written. The
/// store never retries on the caller's behalf.
///
/// ## Read semantics
///
/// - `get_resource_events` returns one resource's events in version order. An
///   unknown resource yields no events and `ResourceVersion::NoSuchResource`.
/// - `get_all_events` returns every event in global commit order. Projections
///   and cross-resource authorization read this.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn get_resource_events(&self, resource: &Resource) -> Result<ResourceEvents, EventStoreError>;

    async fn commit_event(
        &self,
        resource: &Resource,
        expected: ResourceVersion,
        event: UncommittedEvent,
    ) -> Result<RecordedEvent, EventStoreError>;

    async fn get_all_events(&self) -> Result<Vec<RecordedEvent>, EventStoreError>;
}

#[async_trait]
impl<S> EventStore for Arc<S>
where
    S: EventStore + ?Sized,
{
    async fn get_resource_events(&self, resource: &Resource) -> Result<ResourceEvents, EventStoreError> {
        (**self).get_resource_events(resource).await
    }

    async fn commit_event(
        &self,
        resource: &Resource,
        expected: ResourceVersion,
        event: UncommittedEvent,
    ) -> Result<RecordedEvent, EventStoreError> {
        (**self).commit_event(resource, expected, event).await
    }

    async fn get_all_events(&self) -> Result<Vec<RecordedEvent>, EventStoreError> {
        (**self).get_all_events().await
    }
}
