//! `workshop-auth`: authorization decisions derived from event history.
//!
//! Every predicate here is a pure scan over the events it is given. There is
//! no secondary index and no caching: callers pass whatever history they
//! loaded and get a yes/no back. Facts missing from that history count as
//! "no".

pub mod authorize;
pub mod facts;

pub use authorize::{
    Grant, explain_admin_or_super_user, explain_equipment_access, explain_self_or_privileged,
    is_admin_or_super_user, is_equipment_owner, is_equipment_trainer, is_self_or_privileged,
    is_trainer_owner_or_privileged,
};
