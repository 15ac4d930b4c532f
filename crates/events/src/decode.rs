//! Boundary decoder for persisted event rows.
//!
//! A row holds `event_type` in its own column and a JSON `payload` made of the
//! event's own fields plus `actor` and `recordedAt`. Anything the decoder
//! rejects is a data-integrity problem, not something a retry can fix.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use workshop_core::Actor;

use crate::{DomainEvent, EventType, RecordedEvent};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unknown event type '{0}'")]
    UnknownEventType(String),

    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("payload type '{found}' does not match event_type column '{expected}'")]
    TypeMismatch { expected: String, found: String },

    #[error("malformed {event_type} payload: {reason}")]
    Malformed { event_type: String, reason: String },
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedPayload {
    #[serde(flatten)]
    event: DomainEvent,
    actor: Actor,
    recorded_at: DateTime<Utc>,
}

/// Decoded contents of a payload column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPayload {
    pub event: DomainEvent,
    pub actor: Actor,
    pub recorded_at: DateTime<Utc>,
}

/// Serialize the non-envelope part of a recorded event.
///
/// The `type` discriminant is dropped; it lives in the `event_type` column.
pub fn encode_payload(
    event: &DomainEvent,
    actor: &Actor,
    recorded_at: DateTime<Utc>,
) -> Result<JsonValue, serde_json::Error> {
    let mut value = serde_json::to_value(PersistedPayload {
        event: event.clone(),
        actor: actor.clone(),
        recorded_at,
    })?;
    if let Some(obj) = value.as_object_mut() {
        obj.remove("type");
    }
    Ok(value)
}

/// Validate and decode a payload column against its `event_type` column.
pub fn decode_payload(event_type: &str, payload: &JsonValue) -> Result<DecodedPayload, DecodeError> {
    let kind = EventType::parse(event_type)
        .ok_or_else(|| DecodeError::UnknownEventType(event_type.to_string()))?;

    let mut obj = payload.as_object().cloned().ok_or(DecodeError::NotAnObject)?;
    match obj.get("type") {
        Some(JsonValue::String(found)) if found != kind.as_str() => {
            return Err(DecodeError::TypeMismatch {
                expected: kind.as_str().to_string(),
                found: found.clone(),
            });
        }
        _ => {}
    }
    obj.insert("type".to_string(), JsonValue::String(kind.as_str().to_string()));

    let decoded: PersistedPayload =
        serde_json::from_value(JsonValue::Object(obj)).map_err(|e| DecodeError::Malformed {
            event_type: kind.as_str().to_string(),
            reason: e.to_string(),
        })?;

    Ok(DecodedPayload {
        event: decoded.event,
        actor: decoded.actor,
        recorded_at: decoded.recorded_at,
    })
}

impl RecordedEvent {
    /// Payload column contents for this event.
    pub fn encode_payload(&self) -> Result<JsonValue, serde_json::Error> {
        encode_payload(&self.event, &self.actor, self.recorded_at)
    }
}
