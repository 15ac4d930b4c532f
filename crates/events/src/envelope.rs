use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use workshop_core::{Actor, Resource, ResourceVersion};

use crate::DomainEvent;

/// An event decided by a command, not yet committed.
///
/// Carries the actor so the store can embed it in the persisted payload;
/// `recorded_at` is stamped by the store at commit time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncommittedEvent {
    pub actor: Actor,
    pub event: DomainEvent,
}

impl UncommittedEvent {
    pub fn new(actor: Actor, event: DomainEvent) -> Self {
        Self { actor, event }
    }
}

/// A committed event, as read back from the store.
///
/// - `version` is the 1-based position within `resource` (commit order).
/// - `position` is the store-wide commit position used for full-log reads.
///   Only its ordering is meaningful; gaps are allowed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedEvent {
    pub event_id: Uuid,
    pub resource: Resource,
    pub version: u64,
    pub position: u64,
    pub actor: Actor,
    pub recorded_at: DateTime<Utc>,
    pub event: DomainEvent,
}

impl RecordedEvent {
    /// Resource version once this event has been committed.
    pub fn resource_version(&self) -> ResourceVersion {
        ResourceVersion::from_event_count(self.version)
    }
}

impl AsRef<DomainEvent> for RecordedEvent {
    fn as_ref(&self) -> &DomainEvent {
        &self.event
    }
}

/// Strip store metadata, keeping only the domain payloads in order.
pub fn payloads(events: &[RecordedEvent]) -> Vec<DomainEvent> {
    events.iter().map(|e| e.event.clone()).collect()
}
