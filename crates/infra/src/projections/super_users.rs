//! Super-users read model (full replay).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use workshop_core::MemberNumber;
use workshop_events::{DomainEvent, Projection, RecordedEvent};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuperUser {
    pub member_number: MemberNumber,
    /// When the current declaration was recorded.
    pub since: DateTime<Utc>,
}

pub struct SuperUsers;

impl Projection for SuperUsers {
    type State = BTreeMap<MemberNumber, SuperUser>;

    fn handles(event: &DomainEvent) -> bool {
        matches!(
            event,
            DomainEvent::SuperUserDeclared(_) | DomainEvent::SuperUserRevoked(_)
        )
    }

    fn reduce(state: &mut Self::State, event: &RecordedEvent) {
        match &event.event {
            DomainEvent::SuperUserDeclared(e) => {
                state.entry(e.member_number).or_insert(SuperUser {
                    member_number: e.member_number,
                    since: event.recorded_at,
                });
            }
            DomainEvent::SuperUserRevoked(e) => {
                state.remove(&e.member_number);
            }
            _ => {}
        }
    }
}

pub fn get(events: &[RecordedEvent], member_number: MemberNumber) -> Option<SuperUser> {
    SuperUsers::replay(events).remove(&member_number)
}

pub fn get_all(events: &[RecordedEvent]) -> Vec<SuperUser> {
    SuperUsers::replay(events).into_values().collect()
}
