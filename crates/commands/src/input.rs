//! Field-by-field decoding of untrusted command input.
//!
//! Input arrives as loosely typed JSON (form posts, API bodies, spreadsheet
//! rows). The reader records every offending field instead of stopping at the
//! first one, so callers can report them all at once.

use serde_json::{Map, Value as JsonValue};

use workshop_core::{AreaId, EmailAddress, EquipmentId, MemberNumber, ValidationError};

pub struct InputReader<'a> {
    fields: Option<&'a Map<String, JsonValue>>,
    errors: ValidationError,
}

impl<'a> InputReader<'a> {
    pub fn new(input: &'a JsonValue) -> Self {
        let mut errors = ValidationError::new();
        let fields = input.as_object();
        if fields.is_none() {
            errors.push("input", "must be an object");
        }
        Self { fields, errors }
    }

    fn present(&self, field: &str) -> Option<&'a JsonValue> {
        match self.fields?.get(field) {
            None | Some(JsonValue::Null) => None,
            Some(value) => Some(value),
        }
    }

    /// Read a field that must be present and parse.
    pub fn required<T>(
        &mut self,
        field: &str,
        parse: impl FnOnce(&JsonValue) -> Result<T, String>,
    ) -> Option<T> {
        let Some(value) = self.present(field) else {
            if self.fields.is_some() {
                self.errors.push(field, "is required");
            }
            return None;
        };
        match parse(value) {
            Ok(parsed) => Some(parsed),
            Err(message) => {
                self.errors.push(field, message);
                None
            }
        }
    }

    /// Read a field that may be absent, `null`, or a blank string.
    pub fn optional<T>(
        &mut self,
        field: &str,
        parse: impl FnOnce(&JsonValue) -> Result<T, String>,
    ) -> Option<T> {
        let value = self.present(field)?;
        if value.as_str().is_some_and(|s| s.trim().is_empty()) {
            return None;
        }
        match parse(value) {
            Ok(parsed) => Some(parsed),
            Err(message) => {
                self.errors.push(field, message);
                None
            }
        }
    }

    /// Record a cross-field problem.
    pub fn reject(&mut self, field: &str, message: &str) {
        self.errors.push(field, message);
    }

    /// Finish decoding: every recorded problem, or the value built by `make`.
    ///
    /// `make` is only called when no field failed, so every required field it
    /// unwraps with `?` is present.
    pub fn build<T>(self, make: impl FnOnce() -> Option<T>) -> Result<T, ValidationError> {
        self.errors.into_result()?;
        make().ok_or_else(|| ValidationError::single("input", "is incomplete"))
    }
}

/// Parsers for common field shapes.
pub mod parse {
    use super::*;

    pub fn text(value: &JsonValue) -> Result<String, String> {
        match value.as_str().map(str::trim) {
            Some("") => Err("must not be blank".to_string()),
            Some(s) => Ok(s.to_string()),
            None => Err("must be a string".to_string()),
        }
    }

    pub fn area_id(value: &JsonValue) -> Result<AreaId, String> {
        let s = value.as_str().ok_or("must be a string")?;
        s.parse().map_err(|_| "must be a UUID".to_string())
    }

    pub fn equipment_id(value: &JsonValue) -> Result<EquipmentId, String> {
        let s = value.as_str().ok_or("must be a string")?;
        s.parse().map_err(|_| "must be a UUID".to_string())
    }

    /// Member numbers arrive as JSON numbers from APIs and as strings from forms.
    pub fn member_number(value: &JsonValue) -> Result<MemberNumber, String> {
        match value {
            JsonValue::Number(n) => n
                .as_u64()
                .map(MemberNumber::new)
                .ok_or_else(|| "must be a non-negative integer".to_string()),
            JsonValue::String(s) => s
                .parse()
                .map_err(|_| "must be a non-negative integer".to_string()),
            _ => Err("must be a non-negative integer".to_string()),
        }
    }

    pub fn email(value: &JsonValue) -> Result<EmailAddress, String> {
        let s = value.as_str().ok_or("must be a string")?;
        EmailAddress::parse(s).map_err(|_| "must be an email address".to_string())
    }

    pub fn count(value: &JsonValue) -> Result<u32, String> {
        let n = match value {
            JsonValue::Number(n) => n.as_u64(),
            JsonValue::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        n.and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| "must be a non-negative integer".to_string())
    }

    pub fn epoch_ms(value: &JsonValue) -> Result<i64, String> {
        match value {
            JsonValue::Number(n) => n.as_i64(),
            JsonValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
        .ok_or_else(|| "must be a millisecond timestamp".to_string())
    }
}
