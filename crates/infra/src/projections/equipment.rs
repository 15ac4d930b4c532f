//! Equipment read model (full replay).
//!
//! Trainers and trained members are scoped to the one piece of equipment the
//! event names. Quiz results are kept as recorded, newest last.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use workshop_core::{AreaId, EquipmentId, MemberNumber};
use workshop_events::{DomainEvent, EquipmentTrainingQuizResult, Projection, RecordedEvent};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingRecord {
    pub trained_by: Option<MemberNumber>,
    pub trained_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Equipment {
    pub id: EquipmentId,
    pub name: String,
    pub area_id: AreaId,
    pub training_sheet_id: Option<String>,
    pub trainers: BTreeSet<MemberNumber>,
    /// Latest training per member; revocation removes the entry.
    pub trained_members: BTreeMap<MemberNumber, TrainingRecord>,
    pub quiz_results: Vec<EquipmentTrainingQuizResult>,
}

impl Equipment {
    /// Quiz results for the current training sheet that scored full marks.
    pub fn passed_quizzes(&self) -> impl Iterator<Item = &EquipmentTrainingQuizResult> {
        let sheet = self.training_sheet_id.as_deref();
        self.quiz_results
            .iter()
            .filter(move |q| Some(q.training_sheet_id.as_str()) == sheet && q.passed())
    }
}

pub struct EquipmentProjection;

impl Projection for EquipmentProjection {
    type State = BTreeMap<EquipmentId, Equipment>;

    fn handles(event: &DomainEvent) -> bool {
        matches!(
            event,
            DomainEvent::EquipmentAdded(_)
                | DomainEvent::EquipmentTrainingSheetRegistered(_)
                | DomainEvent::EquipmentTrainingQuizResult(_)
                | DomainEvent::TrainerAdded(_)
                | DomainEvent::MemberTrainedOnEquipment(_)
                | DomainEvent::MemberTrainingRevoked(_)
        )
    }

    fn reduce(state: &mut Self::State, event: &RecordedEvent) {
        match &event.event {
            DomainEvent::EquipmentAdded(e) => {
                state.entry(e.id).or_insert_with(|| Equipment {
                    id: e.id,
                    name: e.name.clone(),
                    area_id: e.area_id,
                    training_sheet_id: None,
                    trainers: BTreeSet::new(),
                    trained_members: BTreeMap::new(),
                    quiz_results: Vec::new(),
                });
            }
            DomainEvent::EquipmentTrainingSheetRegistered(e) => {
                if let Some(eq) = state.get_mut(&e.equipment_id) {
                    eq.training_sheet_id = Some(e.training_sheet_id.clone());
                }
            }
            DomainEvent::EquipmentTrainingQuizResult(e) => {
                if let Some(eq) = state.get_mut(&e.equipment_id) {
                    eq.quiz_results.push(e.clone());
                }
            }
            DomainEvent::TrainerAdded(e) => {
                if let Some(eq) = state.get_mut(&e.equipment_id) {
                    eq.trainers.insert(e.member_number);
                }
            }
            DomainEvent::MemberTrainedOnEquipment(e) => {
                if let Some(eq) = state.get_mut(&e.equipment_id) {
                    eq.trained_members.insert(
                        e.member_number,
                        TrainingRecord {
                            trained_by: e.trained_by,
                            trained_at: event.recorded_at,
                        },
                    );
                }
            }
            DomainEvent::MemberTrainingRevoked(e) => {
                if let Some(eq) = state.get_mut(&e.equipment_id) {
                    eq.trained_members.remove(&e.member_number);
                }
            }
            _ => {}
        }
    }
}

pub fn get(events: &[RecordedEvent], id: EquipmentId) -> Option<Equipment> {
    EquipmentProjection::replay(events).remove(&id)
}

pub fn get_all(events: &[RecordedEvent]) -> Vec<Equipment> {
    EquipmentProjection::replay(events).into_values().collect()
}

/// Equipment located in `area_id`.
pub fn in_area(events: &[RecordedEvent], area_id: AreaId) -> Vec<Equipment> {
    get_all(events)
        .into_iter()
        .filter(|eq| eq.area_id == area_id)
        .collect()
}
