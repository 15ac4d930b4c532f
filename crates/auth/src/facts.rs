//! Primitive facts folded out of an event history.
//!
//! Each function walks the whole slice in commit order; the last relevant
//! event wins. Histories may mix resources (e.g. the full log), so every
//! scan filters on the exact id it was asked about.

use std::collections::BTreeSet;

use workshop_core::{AreaId, EquipmentId, MemberNumber};
use workshop_events::DomainEvent;

/// Is `member` a super user after the most recent declaration/revocation?
pub fn is_super_user<E: AsRef<DomainEvent>>(events: &[E], member: MemberNumber) -> bool {
    let mut declared = false;
    for event in events {
        match event.as_ref() {
            DomainEvent::SuperUserDeclared(e) if e.member_number == member => declared = true,
            DomainEvent::SuperUserRevoked(e) if e.member_number == member => declared = false,
            _ => {}
        }
    }
    declared
}

/// Members currently declared super users.
pub fn super_users<E: AsRef<DomainEvent>>(events: &[E]) -> BTreeSet<MemberNumber> {
    let mut members = BTreeSet::new();
    for event in events {
        match event.as_ref() {
            DomainEvent::SuperUserDeclared(e) => {
                members.insert(e.member_number);
            }
            DomainEvent::SuperUserRevoked(e) => {
                members.remove(&e.member_number);
            }
            _ => {}
        }
    }
    members
}

/// Has `area_id` been created and not removed since?
pub fn area_exists<E: AsRef<DomainEvent>>(events: &[E], area_id: AreaId) -> bool {
    let mut exists = false;
    for event in events {
        match event.as_ref() {
            DomainEvent::AreaCreated(e) if e.id == area_id => exists = true,
            DomainEvent::AreaRemoved(e) if e.id == area_id => exists = false,
            _ => {}
        }
    }
    exists
}

/// Is `member` currently an owner of `area_id`?
///
/// Removing the area drops all of its owners.
pub fn is_area_owner<E: AsRef<DomainEvent>>(
    events: &[E],
    area_id: AreaId,
    member: MemberNumber,
) -> bool {
    let mut owner = false;
    for event in events {
        match event.as_ref() {
            DomainEvent::OwnerAdded(e) if e.area_id == area_id && e.member_number == member => {
                owner = true
            }
            DomainEvent::OwnerRemoved(e) if e.area_id == area_id && e.member_number == member => {
                owner = false
            }
            DomainEvent::AreaRemoved(e) if e.id == area_id => owner = false,
            _ => {}
        }
    }
    owner
}

/// Current owners of `area_id`.
pub fn area_owners<E: AsRef<DomainEvent>>(events: &[E], area_id: AreaId) -> BTreeSet<MemberNumber> {
    let mut owners = BTreeSet::new();
    for event in events {
        match event.as_ref() {
            DomainEvent::OwnerAdded(e) if e.area_id == area_id => {
                owners.insert(e.member_number);
            }
            DomainEvent::OwnerRemoved(e) if e.area_id == area_id => {
                owners.remove(&e.member_number);
            }
            DomainEvent::AreaRemoved(e) if e.id == area_id => owners.clear(),
            _ => {}
        }
    }
    owners
}

/// Area the equipment was added to, if it was added at all.
pub fn equipment_area<E: AsRef<DomainEvent>>(events: &[E], equipment_id: EquipmentId) -> Option<AreaId> {
    let mut area = None;
    for event in events {
        if let DomainEvent::EquipmentAdded(e) = event.as_ref() {
            if e.id == equipment_id {
                area = Some(e.area_id);
            }
        }
    }
    area
}

/// Has `member` ever been added as a trainer for `equipment_id`?
pub fn has_trainer_record<E: AsRef<DomainEvent>>(
    events: &[E],
    equipment_id: EquipmentId,
    member: MemberNumber,
) -> bool {
    events.iter().any(|event| {
        matches!(
            event.as_ref(),
            DomainEvent::TrainerAdded(e) if e.equipment_id == equipment_id && e.member_number == member
        )
    })
}

/// Is `member` currently trained on `equipment_id` (last training event wins)?
pub fn is_trained_on<E: AsRef<DomainEvent>>(
    events: &[E],
    equipment_id: EquipmentId,
    member: MemberNumber,
) -> bool {
    let mut trained = false;
    for event in events {
        match event.as_ref() {
            DomainEvent::MemberTrainedOnEquipment(e)
                if e.equipment_id == equipment_id && e.member_number == member =>
            {
                trained = true
            }
            DomainEvent::MemberTrainingRevoked(e)
                if e.equipment_id == equipment_id && e.member_number == member =>
            {
                trained = false
            }
            _ => {}
        }
    }
    trained
}
