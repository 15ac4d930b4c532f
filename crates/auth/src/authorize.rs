//! Composite authorization policies.
//!
//! - No IO
//! - No panics
//! - No caching: every call rescans the history it is handed
//!
//! The `explain_*` functions return which rule granted access so callers can
//! log it; the `is_*` predicates are their boolean forms.

use serde::Serialize;
use tracing::debug;

use workshop_core::{Actor, EquipmentId, MemberNumber};
use workshop_events::DomainEvent;

use crate::facts;

/// The rule that granted access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Grant {
    AdminToken,
    SuperUser,
    SelfService,
    EquipmentOwner,
    EquipmentTrainer,
}

/// Admin token, or a user whose latest super-user event is a declaration.
pub fn explain_admin_or_super_user<E: AsRef<DomainEvent>>(
    actor: &Actor,
    events: &[E],
) -> Option<Grant> {
    match actor {
        Actor::Token { .. } if actor.is_admin_token() => Some(Grant::AdminToken),
        Actor::User { member_number, .. } if facts::is_super_user(events, *member_number) => {
            Some(Grant::SuperUser)
        }
        _ => None,
    }
}

pub fn is_admin_or_super_user<E: AsRef<DomainEvent>>(actor: &Actor, events: &[E]) -> bool {
    explain_admin_or_super_user(actor, events).is_some()
}

/// The actor is the target member, or is privileged.
pub fn explain_self_or_privileged<E: AsRef<DomainEvent>>(
    actor: &Actor,
    target: MemberNumber,
    events: &[E],
) -> Option<Grant> {
    if actor.member_number() == Some(target) {
        return Some(Grant::SelfService);
    }
    explain_admin_or_super_user(actor, events)
}

pub fn is_self_or_privileged<E: AsRef<DomainEvent>>(
    actor: &Actor,
    target: MemberNumber,
    events: &[E],
) -> bool {
    explain_self_or_privileged(actor, target, events).is_some()
}

/// The actor currently owns the area the equipment belongs to.
///
/// Equipment is resolved to its area through `EquipmentAdded`; ownership is
/// then read from that area's `OwnerAdded`/`OwnerRemoved` events only.
pub fn is_equipment_owner<E: AsRef<DomainEvent>>(
    actor: &Actor,
    equipment_id: EquipmentId,
    events: &[E],
) -> bool {
    let Some(member) = actor.member_number() else {
        return false;
    };
    match facts::equipment_area(events, equipment_id) {
        Some(area_id) => facts::is_area_owner(events, area_id, member),
        None => false,
    }
}

/// The actor was made a trainer for this exact equipment and still owns its area.
///
/// Trainers are drawn from area owners: a `TrainerAdded` only counts while the
/// `OwnerAdded` on the owning area that backs it is still in force. Every
/// trainer is therefore also an equipment owner, so this never grants access
/// that [`is_equipment_owner`] denies; it only decides which [`Grant`] is
/// reported.
pub fn is_equipment_trainer<E: AsRef<DomainEvent>>(
    actor: &Actor,
    equipment_id: EquipmentId,
    events: &[E],
) -> bool {
    let Some(member) = actor.member_number() else {
        return false;
    };
    facts::has_trainer_record(events, equipment_id, member)
        && is_equipment_owner(actor, equipment_id, events)
}

/// Trainer first, then owner, then privileged; the first match is what the audit log records.
///
/// The trainer branch only refines the label: it grants nothing the owner
/// branch would not.
pub fn explain_equipment_access<E: AsRef<DomainEvent>>(
    actor: &Actor,
    equipment_id: EquipmentId,
    events: &[E],
) -> Option<Grant> {
    let grant = if is_equipment_trainer(actor, equipment_id, events) {
        Some(Grant::EquipmentTrainer)
    } else if is_equipment_owner(actor, equipment_id, events) {
        Some(Grant::EquipmentOwner)
    } else {
        explain_admin_or_super_user(actor, events)
    };
    debug!(%equipment_id, ?grant, "equipment access decision");
    grant
}

pub fn is_trainer_owner_or_privileged<E: AsRef<DomainEvent>>(
    actor: &Actor,
    equipment_id: EquipmentId,
    events: &[E],
) -> bool {
    explain_equipment_access(actor, equipment_id, events).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use workshop_core::{AreaId, EmailAddress};
    use workshop_events::{
        AreaCreated, EquipmentAdded, OwnerAdded, OwnerRemoved, SuperUserDeclared,
        SuperUserRevoked, TrainerAdded,
    };

    fn member(n: u64) -> Actor {
        Actor::user(
            MemberNumber::new(n),
            EmailAddress::parse(&format!("member{n}@example.com")).unwrap(),
        )
    }

    fn declared(n: u64) -> DomainEvent {
        DomainEvent::SuperUserDeclared(SuperUserDeclared {
            member_number: MemberNumber::new(n),
        })
    }

    fn revoked(n: u64) -> DomainEvent {
        DomainEvent::SuperUserRevoked(SuperUserRevoked {
            member_number: MemberNumber::new(n),
        })
    }

    /// One area holding two pieces of equipment.
    struct Workshop {
        area_id: AreaId,
        lathe: EquipmentId,
        mill: EquipmentId,
        events: Vec<DomainEvent>,
    }

    fn workshop() -> Workshop {
        let area_id = AreaId::new();
        let lathe = EquipmentId::new();
        let mill = EquipmentId::new();
        let events = vec![
            DomainEvent::AreaCreated(AreaCreated {
                id: area_id,
                name: "Metalwork".to_string(),
            }),
            DomainEvent::EquipmentAdded(EquipmentAdded {
                id: lathe,
                name: "Lathe".to_string(),
                area_id,
            }),
            DomainEvent::EquipmentAdded(EquipmentAdded {
                id: mill,
                name: "Mill".to_string(),
                area_id,
            }),
        ];
        Workshop {
            area_id,
            lathe,
            mill,
            events,
        }
    }

    #[test]
    fn admin_token_is_privileged_with_empty_history() {
        let empty: Vec<DomainEvent> = vec![];
        assert_eq!(
            explain_admin_or_super_user(&Actor::admin_token(), &empty),
            Some(Grant::AdminToken)
        );
        assert!(!is_admin_or_super_user(&Actor::System, &empty));
        assert!(!is_admin_or_super_user(&member(1), &empty));
    }

    #[test]
    fn redeclared_super_user_is_privileged() {
        let events = vec![declared(1), revoked(1), declared(1)];
        assert!(is_admin_or_super_user(&member(1), &events));
    }

    #[test]
    fn revoked_super_user_is_not_privileged() {
        let events = vec![declared(1), revoked(1)];
        assert!(!is_admin_or_super_user(&member(1), &events));
    }

    #[test]
    fn super_user_status_is_per_member() {
        let events = vec![declared(1), revoked(2)];
        assert!(is_admin_or_super_user(&member(1), &events));
        assert!(!is_admin_or_super_user(&member(2), &events));
    }

    #[test]
    fn self_service_needs_matching_member_number() {
        let empty: Vec<DomainEvent> = vec![];
        assert_eq!(
            explain_self_or_privileged(&member(4), MemberNumber::new(4), &empty),
            Some(Grant::SelfService)
        );
        assert!(!is_self_or_privileged(&member(4), MemberNumber::new(5), &empty));
        assert!(is_self_or_privileged(&Actor::admin_token(), MemberNumber::new(5), &empty));
        assert!(is_self_or_privileged(&member(4), MemberNumber::new(5), &[declared(4)]));
    }

    #[test]
    fn trainer_on_one_machine_is_denied_on_another_in_same_area() {
        let mut w = workshop();
        w.events.push(DomainEvent::OwnerAdded(OwnerAdded {
            area_id: w.area_id,
            member_number: MemberNumber::new(7),
        }));
        w.events.push(DomainEvent::TrainerAdded(TrainerAdded {
            equipment_id: w.lathe,
            member_number: MemberNumber::new(7),
        }));

        assert!(is_equipment_trainer(&member(7), w.lathe, &w.events));
        assert!(!is_equipment_trainer(&member(7), w.mill, &w.events));
    }

    #[test]
    fn owner_of_other_area_is_not_equipment_owner() {
        let w = workshop();
        let other_area = AreaId::new();
        let mut events = w.events.clone();
        events.push(DomainEvent::OwnerAdded(OwnerAdded {
            area_id: other_area,
            member_number: MemberNumber::new(8),
        }));

        assert!(!is_equipment_owner(&member(8), w.lathe, &events));
        assert!(!is_trainer_owner_or_privileged(&member(8), w.mill, &events));
    }

    #[test]
    fn unknown_equipment_denies_everyone_but_privileged() {
        let w = workshop();
        let unknown = EquipmentId::new();
        let mut events = w.events.clone();
        events.push(DomainEvent::OwnerAdded(OwnerAdded {
            area_id: w.area_id,
            member_number: MemberNumber::new(9),
        }));

        assert!(!is_equipment_owner(&member(9), unknown, &events));
        assert_eq!(
            explain_equipment_access(&Actor::admin_token(), unknown, &events),
            Some(Grant::AdminToken)
        );
    }

    #[test]
    fn trainer_loses_access_when_area_ownership_is_removed() {
        let w = workshop();
        let mut events = w.events.clone();
        let n = MemberNumber::new(11);
        events.push(DomainEvent::OwnerAdded(OwnerAdded {
            area_id: w.area_id,
            member_number: n,
        }));
        events.push(DomainEvent::TrainerAdded(TrainerAdded {
            equipment_id: w.lathe,
            member_number: n,
        }));
        assert_eq!(
            explain_equipment_access(&member(11), w.lathe, &events),
            Some(Grant::EquipmentTrainer)
        );

        events.push(DomainEvent::OwnerRemoved(OwnerRemoved {
            area_id: w.area_id,
            member_number: n,
        }));
        assert!(!is_equipment_trainer(&member(11), w.lathe, &events));
        assert!(!is_trainer_owner_or_privileged(&member(11), w.lathe, &events));
    }

    #[test]
    fn owner_without_trainer_record_is_owner_not_trainer() {
        let w = workshop();
        let mut events = w.events.clone();
        events.push(DomainEvent::OwnerAdded(OwnerAdded {
            area_id: w.area_id,
            member_number: MemberNumber::new(12),
        }));
        assert_eq!(
            explain_equipment_access(&member(12), w.mill, &events),
            Some(Grant::EquipmentOwner)
        );
    }

    #[test]
    fn trainer_record_without_ownership_grants_nothing() {
        let w = workshop();
        let mut events = w.events.clone();
        events.push(DomainEvent::TrainerAdded(TrainerAdded {
            equipment_id: w.lathe,
            member_number: MemberNumber::new(13),
        }));
        assert!(!is_equipment_trainer(&member(13), w.lathe, &events));
        assert_eq!(explain_equipment_access(&member(13), w.lathe, &events), None);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: privilege always follows the member's most recent
        /// declaration or revocation, regardless of other members' events.
        #[test]
        fn privilege_follows_latest_toggle(
            toggles in prop::collection::vec((any::<bool>(), 1u64..4), 0..40)
        ) {
            let events: Vec<DomainEvent> = toggles
                .iter()
                .map(|(declare, n)| if *declare { declared(*n) } else { revoked(*n) })
                .collect();

            for n in 1u64..4 {
                let expected = toggles
                    .iter()
                    .rev()
                    .find(|(_, m)| *m == n)
                    .map(|(declare, _)| *declare)
                    .unwrap_or(false);
                prop_assert_eq!(is_admin_or_super_user(&member(n), &events), expected);
            }
        }

        /// Property: whatever the owner/trainer history, being a trainer
        /// implies being an owner of the same equipment.
        #[test]
        fn trainer_implies_owner(steps in prop::collection::vec((0u8..4, 1u64..4), 0..30)) {
            let mut w = workshop();
            for (kind, n) in &steps {
                let member_number = MemberNumber::new(*n);
                w.events.push(match kind {
                    0 => DomainEvent::OwnerAdded(OwnerAdded { area_id: w.area_id, member_number }),
                    1 => DomainEvent::OwnerRemoved(OwnerRemoved { area_id: w.area_id, member_number }),
                    2 => DomainEvent::TrainerAdded(TrainerAdded { equipment_id: w.lathe, member_number }),
                    _ => DomainEvent::TrainerAdded(TrainerAdded { equipment_id: w.mill, member_number }),
                });
            }
            for n in 1u64..4 {
                for eq in [w.lathe, w.mill] {
                    if is_equipment_trainer(&member(n), eq, &w.events) {
                        prop_assert!(is_equipment_owner(&member(n), eq, &w.events));
                    }
                }
            }
        }
    }
}
