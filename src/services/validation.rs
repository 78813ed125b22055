//! Per-field validation errors
//!
//! Editors submit whole records; every failing field is reported at once so
//! the form can mark all of them in one round trip.

use serde::Serialize;
use std::collections::BTreeMap;

/// Field name -> first error message for that field
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error. The first message for a field wins.
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_insert_with(|| message.into());
    }

    /// Check a trimmed length range, counted in characters.
    pub fn check_length(&mut self, field: &str, value: &str, min: usize, max: usize, too_short: &str) {
        let len = value.trim().chars().count();
        if len < min {
            self.add(field, too_short);
        } else if len > max {
            self.add(field, format!("Must be at most {} characters.", max));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.0).unwrap_or_default()
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fields: Vec<&str> = self.fields().collect();
        write!(f, "invalid fields: {}", fields.join(", "))
    }
}
