//! Field visitor turning tracing fields into JSON values.
//!
//! The `message` field is kept apart from the others so it can become the
//! entry's message; everything else lands in the fields map. Numbers and
//! booleans keep their JSON type, `Debug`-only values become strings.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use tracing::field::{Field, Visit};

pub(crate) const MESSAGE_FIELD: &str = "message";

/// Collects the fields of an event or span.
#[derive(Debug, Default)]
pub(crate) struct FieldVisitor {
    message: Option<String>,
    fields: BTreeMap<String, Value>,
}

impl FieldVisitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume the visitor, returning the message (if any) and the other fields.
    pub fn into_parts(self) -> (Option<String>, BTreeMap<String, Value>) {
        (self.message, self.fields)
    }

    fn insert(&mut self, field: &Field, value: Value) {
        if field.name() == MESSAGE_FIELD {
            let text = match value {
                Value::String(text) => text,
                other => other.to_string(),
            };
            self.message = Some(text);
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for FieldVisitor {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, Value::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::from(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.insert(field, Value::from(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, Value::from(format!("{:?}", value)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_visitor() {
        let (message, fields) = FieldVisitor::new().into_parts();
        assert!(message.is_none());
        assert!(fields.is_empty());
    }
}
