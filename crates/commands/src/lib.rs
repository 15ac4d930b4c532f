//! Workshop commands (event-sourced).
//!
//! This crate contains the decision logic for every write the workshop
//! supports, implemented purely as deterministic domain logic (no IO, no
//! HTTP, no storage). Each command type implements
//! [`workshop_events::Command`].

pub mod area;
pub mod equipment;
pub mod input;
pub mod member;
pub mod super_user;

pub use area::{AddOwner, CreateArea, RemoveArea, RemoveOwner};
pub use equipment::{
    AddEquipment, AddTrainer, MarkMemberTrained, RecordQuizResult, RegisterTrainingSheet,
    RevokeMemberTrained,
};
pub use input::InputReader;
pub use member::{LinkNumberToEmail, UpdateMemberDetails};
pub use super_user::{DeclareSuperUser, RevokeSuperUser};
