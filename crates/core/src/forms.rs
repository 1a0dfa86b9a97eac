//! Field-scoped validation errors shared by every form shape.

use std::collections::BTreeMap;

use serde::Serialize;

/// Message used for a required field left blank.
pub const REQUIRED_MESSAGE: &str = "This field is required.";

/// Validation failures keyed by form field name.
///
/// Ordered so responses and test assertions are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `message` against `field`.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    /// Record the standard "required" message against `field`.
    pub fn required(&mut self, field: impl Into<String>) {
        self.add(field, REQUIRED_MESSAGE);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Messages recorded for `field`, empty if none.
    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Field names with at least one error.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Move every error from `other` into `self`.
    pub fn merge(&mut self, other: FieldErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    /// Fold the derive-based checks from `validator` into field errors.
    pub fn extend_from_validator(&mut self, errors: &validator::ValidationErrors) {
        for (field, errs) in errors.field_errors() {
            for err in errs {
                let message = err
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| default_message(&err.code));
                self.add(field.to_string(), message);
            }
        }
    }

    /// `Ok(value)` when no errors were recorded, `Err(self)` otherwise.
    pub fn into_result<T>(self, value: T) -> Result<T, FieldErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

fn default_message(code: &str) -> String {
    match code {
        "length" => "Ensure this value has at most 256 characters.".to_string(),
        "url" => "Enter a valid URL.".to_string(),
        other => format!("Invalid value ({other})."),
    }
}

/// Trimmed copy of `value`; blank input becomes `""`.
pub fn clean_text(value: Option<&str>) -> String {
    value.map(str::trim).unwrap_or_default().to_string()
}

/// Interpret a checkbox-style form value.
///
/// Browsers send `on`; API clients tend to send `true`/`1`.
pub fn parse_checkbox(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("on" | "true" | "1" | "yes")
    )
}
