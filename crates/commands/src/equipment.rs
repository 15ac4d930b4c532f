//! Equipment, trainers and training records.

use serde_json::Value as JsonValue;

use workshop_auth::{facts, is_admin_or_super_user, is_equipment_owner, is_trainer_owner_or_privileged};
use workshop_core::{Actor, AreaId, EquipmentId, MemberNumber, Resource, ValidationError};
use workshop_events::{
    Command, DomainEvent, EquipmentAdded, EquipmentTrainingQuizResult,
    EquipmentTrainingSheetRegistered, MemberTrainedOnEquipment, MemberTrainingRevoked,
    TrainerAdded,
};

use crate::input::{InputReader, parse};

fn equipment_added(history: &[DomainEvent], id: EquipmentId) -> bool {
    facts::equipment_area(history, id).is_some()
}

fn privileged_or_owner(actor: &Actor, equipment_id: EquipmentId, events: &[DomainEvent]) -> bool {
    is_admin_or_super_user(actor, events) || is_equipment_owner(actor, equipment_id, events)
}

/// Command: AddEquipment. Idempotent on `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddEquipment {
    pub id: EquipmentId,
    pub name: String,
    pub area_id: AreaId,
}

impl Command for AddEquipment {
    const NAME: &'static str = "equipment.add";

    fn decode(input: &JsonValue) -> Result<Self, ValidationError> {
        let mut r = InputReader::new(input);
        let id = r.required("id", parse::equipment_id);
        let name = r.required("name", parse::text);
        let area_id = r.required("areaId", parse::area_id);
        r.build(|| {
            Some(Self {
                id: id?,
                name: name?,
                area_id: area_id?,
            })
        })
    }

    fn resource(&self) -> Resource {
        Resource::equipment(self.id)
    }

    fn process(&self, _actor: &Actor, history: &[DomainEvent]) -> Option<DomainEvent> {
        if equipment_added(history, self.id) {
            return None;
        }
        Some(DomainEvent::EquipmentAdded(EquipmentAdded {
            id: self.id,
            name: self.name.clone(),
            area_id: self.area_id,
        }))
    }

    /// Privileged only, and only into an area that currently exists.
    fn is_authorized(&self, actor: &Actor, events: &[DomainEvent]) -> bool {
        is_admin_or_super_user(actor, events) && facts::area_exists(events, self.area_id)
    }
}

/// Command: RegisterTrainingSheet. Links the quiz spreadsheet used for sign-off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterTrainingSheet {
    pub equipment_id: EquipmentId,
    pub training_sheet_id: String,
}

impl Command for RegisterTrainingSheet {
    const NAME: &'static str = "equipment.register_training_sheet";

    fn decode(input: &JsonValue) -> Result<Self, ValidationError> {
        let mut r = InputReader::new(input);
        let equipment_id = r.required("equipmentId", parse::equipment_id);
        let training_sheet_id = r.required("trainingSheetId", parse::text);
        r.build(|| {
            Some(Self {
                equipment_id: equipment_id?,
                training_sheet_id: training_sheet_id?,
            })
        })
    }

    fn resource(&self) -> Resource {
        Resource::equipment(self.equipment_id)
    }

    fn process(&self, _actor: &Actor, history: &[DomainEvent]) -> Option<DomainEvent> {
        if !equipment_added(history, self.equipment_id) {
            return None;
        }
        let current = history.iter().rev().find_map(|e| match e {
            DomainEvent::EquipmentTrainingSheetRegistered(r) if r.equipment_id == self.equipment_id => {
                Some(r.training_sheet_id.as_str())
            }
            _ => None,
        });
        if current == Some(self.training_sheet_id.as_str()) {
            return None;
        }
        Some(DomainEvent::EquipmentTrainingSheetRegistered(
            EquipmentTrainingSheetRegistered {
                equipment_id: self.equipment_id,
                training_sheet_id: self.training_sheet_id.clone(),
            },
        ))
    }

    fn is_authorized(&self, actor: &Actor, events: &[DomainEvent]) -> bool {
        privileged_or_owner(actor, self.equipment_id, events)
    }
}

/// Command: AddTrainer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddTrainer {
    pub equipment_id: EquipmentId,
    pub member_number: MemberNumber,
}

impl Command for AddTrainer {
    const NAME: &'static str = "equipment.add_trainer";

    fn decode(input: &JsonValue) -> Result<Self, ValidationError> {
        let mut r = InputReader::new(input);
        let equipment_id = r.required("equipmentId", parse::equipment_id);
        let member_number = r.required("memberNumber", parse::member_number);
        r.build(|| {
            Some(Self {
                equipment_id: equipment_id?,
                member_number: member_number?,
            })
        })
    }

    fn resource(&self) -> Resource {
        Resource::equipment(self.equipment_id)
    }

    fn process(&self, _actor: &Actor, history: &[DomainEvent]) -> Option<DomainEvent> {
        if !equipment_added(history, self.equipment_id)
            || facts::has_trainer_record(history, self.equipment_id, self.member_number)
        {
            return None;
        }
        Some(DomainEvent::TrainerAdded(TrainerAdded {
            equipment_id: self.equipment_id,
            member_number: self.member_number,
        }))
    }

    fn is_authorized(&self, actor: &Actor, events: &[DomainEvent]) -> bool {
        privileged_or_owner(actor, self.equipment_id, events)
    }
}

/// Command: MarkMemberTrained.
///
/// Always raises a new event: each sign-off is its own fact, so repeats are
/// recorded rather than collapsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkMemberTrained {
    pub equipment_id: EquipmentId,
    pub member_number: MemberNumber,
}

impl Command for MarkMemberTrained {
    const NAME: &'static str = "equipment.mark_member_trained";

    fn decode(input: &JsonValue) -> Result<Self, ValidationError> {
        let mut r = InputReader::new(input);
        let equipment_id = r.required("equipmentId", parse::equipment_id);
        let member_number = r.required("memberNumber", parse::member_number);
        r.build(|| {
            Some(Self {
                equipment_id: equipment_id?,
                member_number: member_number?,
            })
        })
    }

    fn resource(&self) -> Resource {
        Resource::equipment(self.equipment_id)
    }

    fn process(&self, actor: &Actor, history: &[DomainEvent]) -> Option<DomainEvent> {
        if !equipment_added(history, self.equipment_id) {
            return None;
        }
        Some(DomainEvent::MemberTrainedOnEquipment(MemberTrainedOnEquipment {
            equipment_id: self.equipment_id,
            member_number: self.member_number,
            trained_by: actor.member_number(),
        }))
    }

    fn is_authorized(&self, actor: &Actor, events: &[DomainEvent]) -> bool {
        is_trainer_owner_or_privileged(actor, self.equipment_id, events)
    }
}

/// Command: RevokeMemberTrained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevokeMemberTrained {
    pub equipment_id: EquipmentId,
    pub member_number: MemberNumber,
}

impl Command for RevokeMemberTrained {
    const NAME: &'static str = "equipment.revoke_member_trained";

    fn decode(input: &JsonValue) -> Result<Self, ValidationError> {
        let mut r = InputReader::new(input);
        let equipment_id = r.required("equipmentId", parse::equipment_id);
        let member_number = r.required("memberNumber", parse::member_number);
        r.build(|| {
            Some(Self {
                equipment_id: equipment_id?,
                member_number: member_number?,
            })
        })
    }

    fn resource(&self) -> Resource {
        Resource::equipment(self.equipment_id)
    }

    fn process(&self, _actor: &Actor, history: &[DomainEvent]) -> Option<DomainEvent> {
        facts::is_trained_on(history, self.equipment_id, self.member_number).then(|| {
            DomainEvent::MemberTrainingRevoked(MemberTrainingRevoked {
                equipment_id: self.equipment_id,
                member_number: self.member_number,
            })
        })
    }

    fn is_authorized(&self, actor: &Actor, events: &[DomainEvent]) -> bool {
        is_trainer_owner_or_privileged(actor, self.equipment_id, events)
    }
}

/// Command: RecordQuizResult. Raised by spreadsheet ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordQuizResult {
    pub equipment_id: EquipmentId,
    pub training_sheet_id: String,
    pub member_number_provided: Option<MemberNumber>,
    pub email_provided: Option<String>,
    pub score: u32,
    pub max_score: u32,
    pub timestamp_epoch_ms: i64,
}

impl RecordQuizResult {
    pub fn percentage(&self) -> u32 {
        if self.max_score == 0 {
            return 0;
        }
        ((u64::from(self.score) * 100) / u64::from(self.max_score)) as u32
    }

    fn to_event(&self) -> EquipmentTrainingQuizResult {
        EquipmentTrainingQuizResult {
            equipment_id: self.equipment_id,
            training_sheet_id: self.training_sheet_id.clone(),
            member_number_provided: self.member_number_provided,
            email_provided: self.email_provided.clone(),
            score: self.score,
            max_score: self.max_score,
            percentage: self.percentage(),
            timestamp_epoch_ms: self.timestamp_epoch_ms,
        }
    }
}

impl Command for RecordQuizResult {
    const NAME: &'static str = "equipment.record_quiz_result";

    fn decode(input: &JsonValue) -> Result<Self, ValidationError> {
        let mut r = InputReader::new(input);
        let equipment_id = r.required("equipmentId", parse::equipment_id);
        let training_sheet_id = r.required("trainingSheetId", parse::text);
        let member_number_provided = r.optional("memberNumberProvided", parse::member_number);
        let email_provided = r.optional("emailProvided", parse::text);
        let score = r.required("score", parse::count);
        let max_score = r.required("maxScore", parse::count);
        let timestamp_epoch_ms = r.required("timestampEpochMs", parse::epoch_ms);
        if let (Some(score), Some(max)) = (score, max_score) {
            if score > max {
                r.reject("score", "must not exceed maxScore");
            }
        }
        r.build(|| {
            Some(Self {
                equipment_id: equipment_id?,
                training_sheet_id: training_sheet_id?,
                member_number_provided,
                email_provided,
                score: score?,
                max_score: max_score?,
                timestamp_epoch_ms: timestamp_epoch_ms?,
            })
        })
    }

    fn resource(&self) -> Resource {
        Resource::equipment(self.equipment_id)
    }

    fn process(&self, _actor: &Actor, history: &[DomainEvent]) -> Option<DomainEvent> {
        if !equipment_added(history, self.equipment_id) {
            return None;
        }
        let result = self.to_event();
        let already_recorded = history
            .iter()
            .any(|e| matches!(e, DomainEvent::EquipmentTrainingQuizResult(q) if *q == result));
        if already_recorded {
            return None;
        }
        Some(DomainEvent::EquipmentTrainingQuizResult(result))
    }

    /// Only the ingestion job records quiz results.
    fn is_authorized(&self, actor: &Actor, _events: &[DomainEvent]) -> bool {
        actor.is_system()
    }
}
