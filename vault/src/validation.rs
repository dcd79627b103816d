//! Input validation for visit fields
//!
//! A record is stored as one `name,phone,timestamp` line, so separators and
//! control characters are rejected before they reach an archive.

use crate::config::ValidationConfig;
use crate::error::WriteError;

/// Result of checking one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldCheck {
    /// Trimmed value, safe to store
    Valid(String),
    /// Nothing entered
    Empty,
}

/// Validates the free-text fields captured at the till
#[derive(Debug, Clone)]
pub struct FieldValidator {
    config: ValidationConfig,
}

impl FieldValidator {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Trim and check a single field
    pub fn check(&self, field: &'static str, input: &str) -> Result<FieldCheck, WriteError> {
        let value = input.trim();
        if value.is_empty() {
            return Ok(FieldCheck::Empty);
        }

        let length = value.chars().count();
        if length > self.config.max_field_length {
            return Err(WriteError::InvalidField {
                field,
                reason: format!(
                    "{} characters exceeds the limit of {}",
                    length, self.config.max_field_length
                ),
            });
        }

        if value.contains(',') {
            return Err(WriteError::InvalidField {
                field,
                reason: "commas are not allowed".to_string(),
            });
        }

        if value.chars().any(char::is_control) {
            return Err(WriteError::InvalidField {
                field,
                reason: "control characters are not allowed".to_string(),
            });
        }

        Ok(FieldCheck::Valid(value.to_string()))
    }
}

impl Default for FieldValidator {
    fn default() -> Self {
        Self::new(ValidationConfig::default())
    }
}
