//! `workshop-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, actors, resource addressing and the error model shared by every
//! other crate in the workspace.

pub mod actor;
pub mod error;
pub mod id;
pub mod resource;

pub use actor::{Actor, TokenKind};
pub use error::{DomainError, DomainResult, FieldError, ValidationError};
pub use id::{AreaId, EmailAddress, EquipmentId, MemberNumber};
pub use resource::{Resource, ResourceType, ResourceVersion};
