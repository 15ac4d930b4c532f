use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use workshop_core::{Resource, ResourceVersion};
use workshop_events::{RecordedEvent, UncommittedEvent};

use super::r#trait::{EventStore, EventStoreError, ResourceEvents};

#[derive(Debug, Default)]
struct Log {
    /// Every event in commit order; `position` is index + 1.
    events: Vec<RecordedEvent>,
    /// Indices into `events`, per resource, in version order.
    by_resource: HashMap<Resource, Vec<usize>>,
}

impl Log {
    fn version_of(&self, resource: &Resource) -> ResourceVersion {
        let count = self.by_resource.get(resource).map(Vec::len).unwrap_or(0);
        ResourceVersion::from_event_count(count as u64)
    }
}

/// In-memory append-only event store.
///
/// Intended for tests/dev. The version check and the append happen under a
/// single write lock, so racing commits cannot both succeed.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    log: RwLock<Log>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed events across all resources.
    pub fn len(&self) -> usize {
        self.log.read().map(|log| log.events.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> EventStoreError {
    EventStoreError::Unavailable("lock poisoned".to_string())
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn get_resource_events(&self, resource: &Resource) -> Result<ResourceEvents, EventStoreError> {
        let log = self.log.read().map_err(|_| poisoned())?;
        let events = log
            .by_resource
            .get(resource)
            .map(|idx| idx.iter().map(|&i| log.events[i].clone()).collect())
            .unwrap_or_default();
        Ok(ResourceEvents::from_events(events))
    }

    async fn commit_event(
        &self,
        resource: &Resource,
        expected: ResourceVersion,
        event: UncommittedEvent,
    ) -> Result<RecordedEvent, EventStoreError> {
        let mut log = self.log.write().map_err(|_| poisoned())?;

        let actual = log.version_of(resource);
        if actual != expected {
            return Err(EventStoreError::Conflict {
                resource: resource.clone(),
                expected,
                actual,
            });
        }

        let recorded = RecordedEvent {
            event_id: Uuid::now_v7(),
            resource: resource.clone(),
            version: actual.next(),
            position: log.events.len() as u64 + 1,
            actor: event.actor,
            recorded_at: Utc::now(),
            event: event.event,
        };

        let index = log.events.len();
        log.events.push(recorded.clone());
        log.by_resource.entry(resource.clone()).or_default().push(index);

        Ok(recorded)
    }

    async fn get_all_events(&self) -> Result<Vec<RecordedEvent>, EventStoreError> {
        let log = self.log.read().map_err(|_| poisoned())?;
        Ok(log.events.clone())
    }
}
