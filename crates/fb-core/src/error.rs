//! Core error types for filebind
//!
//! Host-side validation errors and record persistence failures.

use std::collections::HashMap;
use thiserror::Error;

/// Errors raised by a record host while persisting or removing a record
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Persistence failed: {0}")]
    Persistence(String),

    #[error("Record is not persisted")]
    NotPersisted,
}

/// Validation errors collection, keyed by attribute name
#[derive(Error, Debug, Default, Clone)]
#[error("Validation errors: {errors:?}")]
pub struct ValidationErrors {
    /// Field-specific errors: field_name -> Vec<error_messages>
    pub errors: HashMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Check if there are errors for a specific field
    pub fn has_error(&self, field: &str) -> bool {
        self.errors.contains_key(field)
    }

    /// Get errors for a specific field
    pub fn get(&self, field: &str) -> Option<&Vec<String>> {
        self.errors.get(field)
    }

    /// Drop the errors recorded for one field
    pub fn clear(&mut self, field: &str) {
        self.errors.remove(field);
    }

    /// `"<field> <message>"` for every error, ordered by field
    pub fn full_messages(&self) -> Vec<String> {
        let mut fields: Vec<_> = self.errors.iter().collect();
        fields.sort_by(|a, b| a.0.cmp(b.0));
        fields
            .into_iter()
            .flat_map(|(field, messages)| {
                messages.iter().map(move |m| format!("{} {}", field, m))
            })
            .collect()
    }
}
