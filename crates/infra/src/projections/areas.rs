//! Areas read model (full replay).

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use workshop_core::{AreaId, MemberNumber};
use workshop_events::{DomainEvent, Projection, RecordedEvent};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Area {
    pub id: AreaId,
    pub name: String,
    pub owners: BTreeSet<MemberNumber>,
}

pub struct Areas;

impl Projection for Areas {
    type State = BTreeMap<AreaId, Area>;

    fn handles(event: &DomainEvent) -> bool {
        matches!(
            event,
            DomainEvent::AreaCreated(_)
                | DomainEvent::AreaRemoved(_)
                | DomainEvent::OwnerAdded(_)
                | DomainEvent::OwnerRemoved(_)
        )
    }

    fn reduce(state: &mut Self::State, event: &RecordedEvent) {
        match &event.event {
            DomainEvent::AreaCreated(e) => {
                state.entry(e.id).or_insert_with(|| Area {
                    id: e.id,
                    name: e.name.clone(),
                    owners: BTreeSet::new(),
                });
            }
            DomainEvent::AreaRemoved(e) => {
                state.remove(&e.id);
            }
            DomainEvent::OwnerAdded(e) => {
                if let Some(area) = state.get_mut(&e.area_id) {
                    area.owners.insert(e.member_number);
                }
            }
            DomainEvent::OwnerRemoved(e) => {
                if let Some(area) = state.get_mut(&e.area_id) {
                    area.owners.remove(&e.member_number);
                }
            }
            _ => {}
        }
    }
}

pub fn get(events: &[RecordedEvent], id: AreaId) -> Option<Area> {
    Areas::replay(events).remove(&id)
}

/// Every existing area, ordered by id.
pub fn get_all(events: &[RecordedEvent]) -> Vec<Area> {
    Areas::replay(events).into_values().collect()
}
