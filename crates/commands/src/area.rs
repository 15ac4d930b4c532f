//! Area lifecycle and ownership.

use serde_json::Value as JsonValue;

use workshop_auth::{facts, is_admin_or_super_user};
use workshop_core::{Actor, AreaId, MemberNumber, Resource, ValidationError};
use workshop_events::{
    AreaCreated, AreaRemoved, Command, DomainEvent, OwnerAdded, OwnerRemoved,
};

use crate::input::{InputReader, parse};

/// Command: CreateArea. Idempotent on `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateArea {
    pub id: AreaId,
    pub name: String,
}

impl Command for CreateArea {
    const NAME: &'static str = "area.create";

    fn decode(input: &JsonValue) -> Result<Self, ValidationError> {
        let mut r = InputReader::new(input);
        let id = r.required("id", parse::area_id);
        let name = r.required("name", parse::text);
        r.build(|| Some(Self { id: id?, name: name? }))
    }

    fn resource(&self) -> Resource {
        Resource::area(self.id)
    }

    fn process(&self, _actor: &Actor, history: &[DomainEvent]) -> Option<DomainEvent> {
        let already_created = history
            .iter()
            .any(|e| matches!(e, DomainEvent::AreaCreated(c) if c.id == self.id));
        if already_created {
            return None;
        }
        Some(DomainEvent::AreaCreated(AreaCreated {
            id: self.id,
            name: self.name.clone(),
        }))
    }

    fn is_authorized(&self, actor: &Actor, events: &[DomainEvent]) -> bool {
        is_admin_or_super_user(actor, events)
    }
}

/// Command: RemoveArea.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveArea {
    pub id: AreaId,
}

impl Command for RemoveArea {
    const NAME: &'static str = "area.remove";

    fn decode(input: &JsonValue) -> Result<Self, ValidationError> {
        let mut r = InputReader::new(input);
        let id = r.required("id", parse::area_id);
        r.build(|| Some(Self { id: id? }))
    }

    fn resource(&self) -> Resource {
        Resource::area(self.id)
    }

    fn process(&self, _actor: &Actor, history: &[DomainEvent]) -> Option<DomainEvent> {
        facts::area_exists(history, self.id)
            .then(|| DomainEvent::AreaRemoved(AreaRemoved { id: self.id }))
    }

    fn is_authorized(&self, actor: &Actor, events: &[DomainEvent]) -> bool {
        is_admin_or_super_user(actor, events)
    }
}

/// Command: AddOwner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddOwner {
    pub area_id: AreaId,
    pub member_number: MemberNumber,
}

impl Command for AddOwner {
    const NAME: &'static str = "area.add_owner";

    fn decode(input: &JsonValue) -> Result<Self, ValidationError> {
        let mut r = InputReader::new(input);
        let area_id = r.required("areaId", parse::area_id);
        let member_number = r.required("memberNumber", parse::member_number);
        r.build(|| {
            Some(Self {
                area_id: area_id?,
                member_number: member_number?,
            })
        })
    }

    fn resource(&self) -> Resource {
        Resource::area(self.area_id)
    }

    fn process(&self, _actor: &Actor, history: &[DomainEvent]) -> Option<DomainEvent> {
        if !facts::area_exists(history, self.area_id)
            || facts::is_area_owner(history, self.area_id, self.member_number)
        {
            return None;
        }
        Some(DomainEvent::OwnerAdded(OwnerAdded {
            area_id: self.area_id,
            member_number: self.member_number,
        }))
    }

    fn is_authorized(&self, actor: &Actor, events: &[DomainEvent]) -> bool {
        is_admin_or_super_user(actor, events)
    }
}

/// Command: RemoveOwner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveOwner {
    pub area_id: AreaId,
    pub member_number: MemberNumber,
}

impl Command for RemoveOwner {
    const NAME: &'static str = "area.remove_owner";

    fn decode(input: &JsonValue) -> Result<Self, ValidationError> {
        let mut r = InputReader::new(input);
        let area_id = r.required("areaId", parse::area_id);
        let member_number = r.required("memberNumber", parse::member_number);
        r.build(|| {
            Some(Self {
                area_id: area_id?,
                member_number: member_number?,
            })
        })
    }

    fn resource(&self) -> Resource {
        Resource::area(self.area_id)
    }

    fn process(&self, _actor: &Actor, history: &[DomainEvent]) -> Option<DomainEvent> {
        facts::is_area_owner(history, self.area_id, self.member_number).then(|| {
            DomainEvent::OwnerRemoved(OwnerRemoved {
                area_id: self.area_id,
                member_number: self.member_number,
            })
        })
    }

    fn is_authorized(&self, actor: &Actor, events: &[DomainEvent]) -> bool {
        is_admin_or_super_user(actor, events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;
    use workshop_events::SuperUserDeclared;

    fn created(id: AreaId) -> DomainEvent {
        DomainEvent::AreaCreated(AreaCreated {
            id,
            name: "Woodwork".to_string(),
        })
    }

    fn add_owner(area_id: AreaId, n: u64) -> AddOwner {
        AddOwner {
            area_id,
            member_number: MemberNumber::new(n),
        }
    }

    #[test]
    fn create_area_is_idempotent() {
        let cmd = CreateArea {
            id: AreaId::new(),
            name: "Woodwork".to_string(),
        };
        let first = cmd.process(&Actor::admin_token(), &[]).unwrap();
        assert_eq!(first, created(cmd.id));
        assert_eq!(cmd.process(&Actor::admin_token(), &[first]), None);
    }

    #[test]
    fn decode_create_area_reports_bad_fields() {
        let err = CreateArea::decode(&json!({"id": "not-a-uuid", "name": ""})).unwrap_err();
        assert_eq!(err.field_names(), vec!["id", "name"]);

        let id = AreaId::new();
        let cmd = CreateArea::decode(&json!({"id": id.to_string(), "name": " Laser "})).unwrap();
        assert_eq!(cmd.name, "Laser");
        assert_eq!(cmd.resource(), Resource::area(id));
    }

    #[test]
    fn re_adding_a_removed_owner_emits_again() {
        let area_id = AreaId::new();
        let history = vec![
            created(area_id),
            DomainEvent::OwnerAdded(OwnerAdded {
                area_id,
                member_number: MemberNumber::new(5),
            }),
            DomainEvent::OwnerRemoved(OwnerRemoved {
                area_id,
                member_number: MemberNumber::new(5),
            }),
        ];
        let ev = add_owner(area_id, 5).process(&Actor::System, &history);
        assert!(matches!(ev, Some(DomainEvent::OwnerAdded(_))));
    }

    #[test]
    fn adding_a_current_owner_is_a_no_op() {
        let area_id = AreaId::new();
        let history = vec![
            created(area_id),
            DomainEvent::OwnerAdded(OwnerAdded {
                area_id,
                member_number: MemberNumber::new(5),
            }),
        ];
        assert_eq!(add_owner(area_id, 5).process(&Actor::System, &history), None);
    }

    #[test]
    fn owner_commands_need_an_existing_area() {
        let area_id = AreaId::new();
        assert_eq!(add_owner(area_id, 1).process(&Actor::System, &[]), None);

        let history = vec![created(area_id), DomainEvent::AreaRemoved(AreaRemoved { id: area_id })];
        assert_eq!(add_owner(area_id, 1).process(&Actor::System, &history), None);
        assert_eq!(
            RemoveArea { id: area_id }.process(&Actor::System, &history),
            None
        );
    }

    #[test]
    fn removing_a_non_owner_is_a_no_op() {
        let area_id = AreaId::new();
        let cmd = RemoveOwner {
            area_id,
            member_number: MemberNumber::new(2),
        };
        assert_eq!(cmd.process(&Actor::System, &[created(area_id)]), None);
    }

    #[test]
    fn only_privileged_actors_manage_areas() {
        let cmd = add_owner(AreaId::new(), 1);
        let user = Actor::user(
            MemberNumber::new(9),
            workshop_core::EmailAddress::parse("nine@example.com").unwrap(),
        );
        assert!(!cmd.is_authorized(&user, &[]));
        assert!(cmd.is_authorized(&Actor::admin_token(), &[]));
        let events = vec![DomainEvent::SuperUserDeclared(SuperUserDeclared {
            member_number: MemberNumber::new(9),
        })];
        assert!(cmd.is_authorized(&user, &events));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 128,
            ..ProptestConfig::default()
        })]

        /// Property: however add/remove requests interleave, the committed
        /// history for a member alternates between OwnerAdded and OwnerRemoved.
        #[test]
        fn owner_history_alternates(requests in prop::collection::vec(any::<bool>(), 0..30)) {
            let area_id = AreaId::new();
            let member_number = MemberNumber::new(3);
            let mut history = vec![created(area_id)];

            for add in requests {
                let decided = if add {
                    AddOwner { area_id, member_number }.process(&Actor::System, &history)
                } else {
                    RemoveOwner { area_id, member_number }.process(&Actor::System, &history)
                };
                history.extend(decided);
            }

            let toggles: Vec<bool> = history
                .iter()
                .filter_map(|e| match e {
                    DomainEvent::OwnerAdded(_) => Some(true),
                    DomainEvent::OwnerRemoved(_) => Some(false),
                    _ => None,
                })
                .collect();
            for pair in toggles.windows(2) {
                prop_assert_ne!(pair[0], pair[1]);
            }
            if let Some(first) = toggles.first() {
                prop_assert!(*first);
            }
        }
    }
}
