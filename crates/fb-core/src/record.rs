//! In-memory record host
//!
//! Used by tests and by embedders that keep their own persistence.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{RecordError, ValidationErrors};
use crate::traits::{Persistable, RecordEvent, RecordHost, SCENARIO_INSERT, SCENARIO_UPDATE};
use crate::value::Value;

/// Validation rule for a single attribute; returns an error message on failure
pub type Rule = Arc<dyn Fn(&Value) -> Option<String> + Send + Sync>;

/// Record held entirely in memory
pub struct MemoryRecord {
    form_name: String,
    scenario: String,
    attributes: HashMap<String, Value>,
    old_attributes: HashMap<String, Value>,
    persisted: bool,
    removed: bool,
    errors: ValidationErrors,
    rules: Vec<(String, Rule)>,
    events: Vec<RecordEvent>,
}

impl MemoryRecord {
    /// A new, unsaved record in the `insert` scenario
    pub fn new(form_name: impl Into<String>) -> Self {
        Self {
            form_name: form_name.into(),
            scenario: SCENARIO_INSERT.to_string(),
            attributes: HashMap::new(),
            old_attributes: HashMap::new(),
            persisted: false,
            removed: false,
            errors: ValidationErrors::new(),
            rules: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_scenario(mut self, scenario: impl Into<String>) -> Self {
        self.scenario = scenario.into();
        self
    }

    pub fn with_rule(mut self, attribute: impl Into<String>, rule: Rule) -> Self {
        self.rules.push((attribute.into(), rule));
        self
    }

    /// Treat the current attributes as already stored and switch to the
    /// `update` scenario
    pub fn into_persisted(mut self) -> Self {
        self.old_attributes = self.attributes.clone();
        self.persisted = true;
        self.scenario = SCENARIO_UPDATE.to_string();
        self
    }

    pub fn set_scenario(&mut self, scenario: impl Into<String>) {
        self.scenario = scenario.into();
    }

    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    pub fn events(&self) -> &[RecordEvent] {
        &self.events
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }
}

impl fmt::Debug for MemoryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryRecord")
            .field("form_name", &self.form_name)
            .field("scenario", &self.scenario)
            .field("attributes", &self.attributes)
            .field("persisted", &self.persisted)
            .field("errors", &self.errors)
            .finish_non_exhaustive()
    }
}

impl RecordHost for MemoryRecord {
    fn form_name(&self) -> &str {
        &self.form_name
    }

    fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    fn set_attribute(&mut self, name: &str, value: Value) {
        self.attributes.insert(name.to_string(), value);
    }

    fn unset_attribute(&mut self, name: &str) {
        match self.old_attributes.get(name) {
            Some(old) => {
                self.attributes.insert(name.to_string(), old.clone());
            }
            None => {
                self.attributes.remove(name);
            }
        }
    }

    fn old_attribute(&self, name: &str) -> Option<&Value> {
        self.old_attributes.get(name)
    }

    fn is_attribute_changed(&self, name: &str) -> bool {
        self.attributes.get(name) != self.old_attributes.get(name)
    }

    fn scenario(&self) -> &str {
        &self.scenario
    }

    fn is_new_record(&self) -> bool {
        !self.persisted
    }

    fn has_errors(&self, attribute: &str) -> bool {
        self.errors.has_error(attribute)
    }

    fn validate_attribute(&mut self, attribute: &str) -> bool {
        self.errors.clear(attribute);
        let value = self.attributes.get(attribute).cloned().unwrap_or_default();

        for (name, rule) in &self.rules {
            if name == attribute {
                if let Some(message) = rule(&value) {
                    self.errors.add(attribute, message);
                }
            }
        }

        !self.errors.has_error(attribute)
    }

    fn trigger_event(&mut self, event: RecordEvent) {
        self.events.push(event);
    }
}

impl Persistable for MemoryRecord {
    fn validate(&mut self) -> bool {
        self.errors = ValidationErrors::new();
        let attributes: Vec<String> = self.rules.iter().map(|(name, _)| name.clone()).collect();
        for attribute in attributes {
            self.validate_attribute(&attribute);
        }
        self.errors.is_empty()
    }

    fn persist(&mut self) -> Result<(), RecordError> {
        if let Some((name, _)) = self.attributes.iter().find(|(_, v)| v.is_upload()) {
            return Err(RecordError::Persistence(format!(
                "attribute {} still holds an upload",
                name
            )));
        }
        self.old_attributes = self.attributes.clone();
        self.persisted = true;
        Ok(())
    }

    fn remove(&mut self) -> Result<(), RecordError> {
        if !self.persisted {
            return Err(RecordError::NotPersisted);
        }
        self.persisted = false;
        self.removed = true;
        Ok(())
    }
}

/// Common validation rules
pub mod rules {
    use super::Rule;
    use crate::value::Value;
    use std::sync::Arc;

    /// Attribute must carry a file
    pub fn required() -> Rule {
        Arc::new(|value: &Value| {
            if value.file_name().is_none() {
                Some("cannot be blank".to_string())
            } else {
                None
            }
        })
    }

    /// Uploads must have one of the given extensions
    pub fn extensions(allowed: &[&str]) -> Rule {
        let allowed: Vec<String> = allowed.iter().map(|e| e.to_lowercase()).collect();
        Arc::new(move |value: &Value| {
            let file = value.as_upload()?;
            match file.extension() {
                Some(ext) if allowed.contains(&ext) => None,
                _ => Some(format!(
                    "only files with these extensions are allowed: {}",
                    allowed.join(", ")
                )),
            }
        })
    }

    /// Uploads must not exceed `max` bytes
    pub fn max_size(max: u64) -> Rule {
        Arc::new(move |value: &Value| {
            let file = value.as_upload()?;
            if file.size > max {
                Some(format!("is too big ({} bytes, maximum is {})", file.size, max))
            } else {
                None
            }
        })
    }
}
