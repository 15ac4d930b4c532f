//! The closed set of domain events.

use serde::{Deserialize, Serialize};

use workshop_core::{AreaId, EmailAddress, EquipmentId, MemberNumber};

/// Event: AreaCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaCreated {
    pub id: AreaId,
    pub name: String,
}

/// Event: AreaRemoved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaRemoved {
    pub id: AreaId,
}

/// Event: OwnerAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerAdded {
    pub area_id: AreaId,
    pub member_number: MemberNumber,
}

/// Event: OwnerRemoved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerRemoved {
    pub area_id: AreaId,
    pub member_number: MemberNumber,
}

/// Event: EquipmentAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentAdded {
    pub id: EquipmentId,
    pub name: String,
    pub area_id: AreaId,
}

/// Event: EquipmentTrainingSheetRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentTrainingSheetRegistered {
    pub equipment_id: EquipmentId,
    pub training_sheet_id: String,
}

/// Event: EquipmentTrainingQuizResult.
///
/// Member number and email are recorded as the quiz-taker typed them; neither
/// is guaranteed to identify a real member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentTrainingQuizResult {
    pub equipment_id: EquipmentId,
    pub training_sheet_id: String,
    pub member_number_provided: Option<MemberNumber>,
    pub email_provided: Option<String>,
    pub score: u32,
    pub max_score: u32,
    pub percentage: u32,
    pub timestamp_epoch_ms: i64,
}

impl EquipmentTrainingQuizResult {
    pub fn passed(&self) -> bool {
        self.max_score > 0 && self.score == self.max_score
    }
}

/// Event: TrainerAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainerAdded {
    pub equipment_id: EquipmentId,
    pub member_number: MemberNumber,
}

/// Event: MemberTrainedOnEquipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberTrainedOnEquipment {
    pub equipment_id: EquipmentId,
    pub member_number: MemberNumber,
    /// Member number of the trainer, when a member (not a token/system) did it.
    pub trained_by: Option<MemberNumber>,
}

/// Event: MemberTrainingRevoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberTrainingRevoked {
    pub equipment_id: EquipmentId,
    pub member_number: MemberNumber,
}

/// Event: SuperUserDeclared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuperUserDeclared {
    pub member_number: MemberNumber,
}

/// Event: SuperUserRevoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuperUserRevoked {
    pub member_number: MemberNumber,
}

/// Event: MemberNumberLinkedToEmail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberNumberLinkedToEmail {
    pub member_number: MemberNumber,
    pub email: EmailAddress,
}

/// Event: MemberDetailsUpdated. `None` fields are left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberDetailsUpdated {
    pub member_number: MemberNumber,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub pronouns: Option<String>,
}

/// Every fact the system can record.
///
/// Closed: decision functions and reducers match over it exhaustively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DomainEvent {
    AreaCreated(AreaCreated),
    AreaRemoved(AreaRemoved),
    OwnerAdded(OwnerAdded),
    OwnerRemoved(OwnerRemoved),
    EquipmentAdded(EquipmentAdded),
    EquipmentTrainingSheetRegistered(EquipmentTrainingSheetRegistered),
    EquipmentTrainingQuizResult(EquipmentTrainingQuizResult),
    TrainerAdded(TrainerAdded),
    MemberTrainedOnEquipment(MemberTrainedOnEquipment),
    MemberTrainingRevoked(MemberTrainingRevoked),
    SuperUserDeclared(SuperUserDeclared),
    SuperUserRevoked(SuperUserRevoked),
    MemberNumberLinkedToEmail(MemberNumberLinkedToEmail),
    MemberDetailsUpdated(MemberDetailsUpdated),
}

/// Discriminant of a [`DomainEvent`], as stored in the `event_type` column.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventType {
    AreaCreated,
    AreaRemoved,
    OwnerAdded,
    OwnerRemoved,
    EquipmentAdded,
    EquipmentTrainingSheetRegistered,
    EquipmentTrainingQuizResult,
    TrainerAdded,
    MemberTrainedOnEquipment,
    MemberTrainingRevoked,
    SuperUserDeclared,
    SuperUserRevoked,
    MemberNumberLinkedToEmail,
    MemberDetailsUpdated,
}

impl EventType {
    pub const ALL: [EventType; 14] = [
        EventType::AreaCreated,
        EventType::AreaRemoved,
        EventType::OwnerAdded,
        EventType::OwnerRemoved,
        EventType::EquipmentAdded,
        EventType::EquipmentTrainingSheetRegistered,
        EventType::EquipmentTrainingQuizResult,
        EventType::TrainerAdded,
        EventType::MemberTrainedOnEquipment,
        EventType::MemberTrainingRevoked,
        EventType::SuperUserDeclared,
        EventType::SuperUserRevoked,
        EventType::MemberNumberLinkedToEmail,
        EventType::MemberDetailsUpdated,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventType::AreaCreated => "AreaCreated",
            EventType::AreaRemoved => "AreaRemoved",
            EventType::OwnerAdded => "OwnerAdded",
            EventType::OwnerRemoved => "OwnerRemoved",
            EventType::EquipmentAdded => "EquipmentAdded",
            EventType::EquipmentTrainingSheetRegistered => "EquipmentTrainingSheetRegistered",
            EventType::EquipmentTrainingQuizResult => "EquipmentTrainingQuizResult",
            EventType::TrainerAdded => "TrainerAdded",
            EventType::MemberTrainedOnEquipment => "MemberTrainedOnEquipment",
            EventType::MemberTrainingRevoked => "MemberTrainingRevoked",
            EventType::SuperUserDeclared => "SuperUserDeclared",
            EventType::SuperUserRevoked => "SuperUserRevoked",
            EventType::MemberNumberLinkedToEmail => "MemberNumberLinkedToEmail",
            EventType::MemberDetailsUpdated => "MemberDetailsUpdated",
        }
    }

    pub fn parse(s: &str) -> Option<EventType> {
        EventType::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

impl core::fmt::Display for EventType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DomainEvent {
    pub fn event_type(&self) -> EventType {
        match self {
            DomainEvent::AreaCreated(_) => EventType::AreaCreated,
            DomainEvent::AreaRemoved(_) => EventType::AreaRemoved,
            DomainEvent::OwnerAdded(_) => EventType::OwnerAdded,
            DomainEvent::OwnerRemoved(_) => EventType::OwnerRemoved,
            DomainEvent::EquipmentAdded(_) => EventType::EquipmentAdded,
            DomainEvent::EquipmentTrainingSheetRegistered(_) => {
                EventType::EquipmentTrainingSheetRegistered
            }
            DomainEvent::EquipmentTrainingQuizResult(_) => EventType::EquipmentTrainingQuizResult,
            DomainEvent::TrainerAdded(_) => EventType::TrainerAdded,
            DomainEvent::MemberTrainedOnEquipment(_) => EventType::MemberTrainedOnEquipment,
            DomainEvent::MemberTrainingRevoked(_) => EventType::MemberTrainingRevoked,
            DomainEvent::SuperUserDeclared(_) => EventType::SuperUserDeclared,
            DomainEvent::SuperUserRevoked(_) => EventType::SuperUserRevoked,
            DomainEvent::MemberNumberLinkedToEmail(_) => EventType::MemberNumberLinkedToEmail,
            DomainEvent::MemberDetailsUpdated(_) => EventType::MemberDetailsUpdated,
        }
    }

    /// Schema version of the payload. Bump on breaking payload changes.
    pub fn schema_version(&self) -> u32 {
        1
    }
}

impl AsRef<DomainEvent> for DomainEvent {
    fn as_ref(&self) -> &DomainEvent {
        self
    }
}
