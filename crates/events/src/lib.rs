//! Domain events, their persisted form, and the command/projection contracts
//! built on top of them.
//!
//! Events are facts: immutable, append-only, and the only source of truth.
//! Everything queryable is derived by folding them.

pub mod command;
pub mod decode;
pub mod envelope;
pub mod event;
pub mod projection;
pub mod runner;

pub use command::Command;
pub use decode::DecodeError;
pub use envelope::{RecordedEvent, UncommittedEvent, payloads};
pub use event::*;
pub use projection::Projection;
pub use runner::{Advance, ProjectionCursor, ProjectionRunner};
