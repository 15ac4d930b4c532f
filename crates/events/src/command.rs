use serde_json::Value as JsonValue;

use workshop_core::{Actor, Resource, ValidationError};

use crate::DomainEvent;

/// Static description of one command type.
///
/// Commands represent **intent**; the single event a command may raise is the
/// fact that gets persisted. Every command type supplies four pieces:
///
/// - `decode`: untrusted input → typed command, failing with every offending field
/// - `resource`: the one stream the command decides against and writes to
/// - `process`: the decision function
/// - `is_authorized`: the policy the calling layer checks before applying
///
/// ## Decision functions
///
/// `process` is pure, total and deterministic. It sees only the history of its
/// own resource and returns at most one event. Idempotency lives here: a
/// command that would restate a fact the history already holds returns `None`,
/// which the engine reports as a successful no-op.
///
/// ## Authorization
///
/// `is_authorized` receives whatever history the caller loaded (typically the
/// full log, since policies such as "owner of the equipment's area" span
/// several resources). It must treat unknown or missing facts as a denial.
pub trait Command: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable command name, used in logs.
    const NAME: &'static str;

    fn decode(input: &JsonValue) -> Result<Self, ValidationError>;

    fn resource(&self) -> Resource;

    fn process(&self, actor: &Actor, history: &[DomainEvent]) -> Option<DomainEvent>;

    fn is_authorized(&self, actor: &Actor, events: &[DomainEvent]) -> bool;
}
