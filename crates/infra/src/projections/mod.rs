//! Read models derived from the event log.
//!
//! - `areas`, `equipment`, `members`, `super_users`: recomputed from the full
//!   log on every query (`get` / `get_all`).
//! - `shared_state`: the joined tables, advanced incrementally.

pub mod areas;
pub mod equipment;
pub mod members;
pub mod shared_state;
pub mod super_users;

pub use areas::{Area, Areas};
pub use equipment::{Equipment, EquipmentProjection, TrainingRecord};
pub use members::{Member, Members};
pub use shared_state::{
    AreaSummary, AreaView, EquipmentSummary, EquipmentView, MemberSummary, MemberView, SharedState, SharedTables,
};
pub use super_users::{SuperUser, SuperUsers};
