//! Incrementally maintained shared state.
//!
//! Holds the areas, equipment, members and super-user tables side by side and
//! joins them into the views pages need. Unlike the full-replay modules it is
//! advanced one committed event at a time, reusing their reducers, so folding
//! incrementally and replaying from scratch give identical tables.
//!
//! One writer at a time: every mutation takes the write lock. Every reducer
//! reads only events of the resource it keys on, so events from different
//! resources may be applied in any interleaving.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use workshop_core::{AreaId, EmailAddress, EquipmentId, MemberNumber};
use workshop_events::{Advance, DomainEvent, Projection, ProjectionCursor, ProjectionRunner, RecordedEvent};

use super::areas::{Area, Areas};
use super::equipment::{Equipment, EquipmentProjection};
use super::members::{Member, Members};
use super::super_users::{SuperUser, SuperUsers};
use crate::event_store::{EventStore, EventStoreError};

// ─────────────────────────────────────────────────────────────────────────────
// Tables
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SharedTables {
    pub areas: BTreeMap<AreaId, Area>,
    pub equipment: BTreeMap<EquipmentId, Equipment>,
    pub members: BTreeMap<MemberNumber, Member>,
    pub super_users: BTreeMap<MemberNumber, SuperUser>,
}

impl Projection for SharedTables {
    type State = SharedTables;

    fn handles(_event: &DomainEvent) -> bool {
        true
    }

    fn reduce(state: &mut Self::State, event: &RecordedEvent) {
        Areas::advance(&mut state.areas, event);
        EquipmentProjection::advance(&mut state.equipment, event);
        Members::advance(&mut state.members, event);
        SuperUsers::advance(&mut state.super_users, event);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Views
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberSummary {
    pub member_number: MemberNumber,
    pub name: Option<String>,
    pub email: Option<EmailAddress>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaSummary {
    pub id: AreaId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentSummary {
    pub id: EquipmentId,
    pub name: String,
    pub area_id: AreaId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberView {
    pub member_number: MemberNumber,
    pub email: Option<EmailAddress>,
    pub name: Option<String>,
    pub pronouns: Option<String>,
    pub is_super_user: bool,
    pub owner_of: Vec<AreaSummary>,
    pub trainer_for: Vec<EquipmentSummary>,
    pub trained_on: Vec<EquipmentSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaView {
    pub id: AreaId,
    pub name: String,
    pub owners: Vec<MemberSummary>,
    pub equipment: Vec<EquipmentSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentView {
    pub id: EquipmentId,
    pub name: String,
    /// `None` once the owning area has been removed.
    pub area: Option<AreaSummary>,
    pub training_sheet_id: Option<String>,
    pub trainers: Vec<MemberSummary>,
    pub trained_members: Vec<MemberSummary>,
}

fn equipment_summary(eq: &Equipment) -> EquipmentSummary {
    EquipmentSummary {
        id: eq.id,
        name: eq.name.clone(),
        area_id: eq.area_id,
    }
}

fn area_summary(area: &Area) -> AreaSummary {
    AreaSummary {
        id: area.id,
        name: area.name.clone(),
    }
}

impl SharedTables {
    fn member_summary(&self, member_number: MemberNumber) -> MemberSummary {
        let member = self.members.get(&member_number);
        MemberSummary {
            member_number,
            name: member.and_then(|m| m.name.clone()),
            email: member.and_then(|m| m.email.clone()),
        }
    }

    fn member_summaries<'a>(&self, numbers: impl IntoIterator<Item = &'a MemberNumber>) -> Vec<MemberSummary> {
        numbers.into_iter().map(|n| self.member_summary(*n)).collect()
    }

    pub fn member_view(&self, member_number: MemberNumber) -> Option<MemberView> {
        let member = self.members.get(&member_number)?;
        Some(MemberView {
            member_number,
            email: member.email.clone(),
            name: member.name.clone(),
            pronouns: member.pronouns.clone(),
            is_super_user: self.super_users.contains_key(&member_number),
            owner_of: self
                .areas
                .values()
                .filter(|a| a.owners.contains(&member_number))
                .map(area_summary)
                .collect(),
            trainer_for: self
                .equipment
                .values()
                .filter(|eq| eq.trainers.contains(&member_number))
                .map(equipment_summary)
                .collect(),
            trained_on: self
                .equipment
                .values()
                .filter(|eq| eq.trained_members.contains_key(&member_number))
                .map(equipment_summary)
                .collect(),
        })
    }

    pub fn area_view(&self, id: AreaId) -> Option<AreaView> {
        let area = self.areas.get(&id)?;
        Some(AreaView {
            id,
            name: area.name.clone(),
            owners: self.member_summaries(&area.owners),
            equipment: self
                .equipment
                .values()
                .filter(|eq| eq.area_id == id)
                .map(equipment_summary)
                .collect(),
        })
    }

    pub fn equipment_view(&self, id: EquipmentId) -> Option<EquipmentView> {
        let eq = self.equipment.get(&id)?;
        Some(EquipmentView {
            id,
            name: eq.name.clone(),
            area: self.areas.get(&eq.area_id).map(area_summary),
            training_sheet_id: eq.training_sheet_id.clone(),
            trainers: self.member_summaries(&eq.trainers),
            trained_members: self.member_summaries(eq.trained_members.keys()),
        })
    }

    /// Every member number the tables mention, known details or not.
    pub fn known_member_numbers(&self) -> BTreeSet<MemberNumber> {
        let mut numbers: BTreeSet<MemberNumber> = self.members.keys().copied().collect();
        numbers.extend(self.super_users.keys().copied());
        for area in self.areas.values() {
            numbers.extend(area.owners.iter().copied());
        }
        for eq in self.equipment.values() {
            numbers.extend(eq.trainers.iter().copied());
            numbers.extend(eq.trained_members.keys().copied());
        }
        numbers
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared handle
// ─────────────────────────────────────────────────────────────────────────────

/// Process-wide shared state, advanced as events are committed.
#[derive(Default)]
pub struct SharedState {
    runner: RwLock<ProjectionRunner<SharedTables>>,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_events<'a>(events: impl IntoIterator<Item = &'a RecordedEvent>) -> Self {
        Self {
            runner: RwLock::new(ProjectionRunner::rebuild_from_scratch(events)),
        }
    }

    // Reducers never panic mid-update, so a poisoned lock still guards
    // consistent tables.
    fn read(&self) -> RwLockReadGuard<'_, ProjectionRunner<SharedTables>> {
        self.runner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ProjectionRunner<SharedTables>> {
        self.runner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply one committed event. A position applied before is skipped.
    pub fn apply(&self, event: &RecordedEvent) -> Advance {
        let advance = self.write().apply(event);
        if advance == Advance::AlreadySeen {
            debug!(position = event.position, "skipping already-applied event");
        }
        advance
    }

    /// Discard everything and replay `events` from scratch.
    pub fn rebuild<'a>(&self, events: impl IntoIterator<Item = &'a RecordedEvent>) {
        *self.write() = ProjectionRunner::rebuild_from_scratch(events);
    }

    /// Apply every stored event not applied yet, including ones that became
    /// visible behind the cursor. Returns how many were applied.
    #[instrument(skip_all, fields(applied = tracing::field::Empty), err)]
    pub async fn catch_up<S>(&self, store: &S) -> Result<usize, EventStoreError>
    where
        S: EventStore + ?Sized,
    {
        let events = store.get_all_events().await?;
        let mut runner = self.write();
        let applied = events
            .iter()
            .filter(|e| runner.apply(e) == Advance::Applied)
            .count();
        drop(runner);
        tracing::Span::current().record("applied", applied);
        Ok(applied)
    }

    pub fn cursor(&self) -> Option<ProjectionCursor> {
        self.read().cursor()
    }

    /// Copy of the current tables.
    pub fn snapshot(&self) -> SharedTables {
        self.read().state().clone()
    }

    pub fn member(&self, member_number: MemberNumber) -> Option<MemberView> {
        self.read().state().member_view(member_number)
    }

    /// Every member with recorded details, ordered by member number.
    pub fn members(&self) -> Vec<MemberView> {
        let runner = self.read();
        let tables = runner.state();
        tables
            .members
            .keys()
            .filter_map(|n| tables.member_view(*n))
            .collect()
    }

    pub fn area(&self, id: AreaId) -> Option<AreaView> {
        self.read().state().area_view(id)
    }

    pub fn areas(&self) -> Vec<AreaView> {
        let runner = self.read();
        let tables = runner.state();
        tables.areas.keys().filter_map(|id| tables.area_view(*id)).collect()
    }

    pub fn equipment(&self, id: EquipmentId) -> Option<EquipmentView> {
        self.read().state().equipment_view(id)
    }
}
