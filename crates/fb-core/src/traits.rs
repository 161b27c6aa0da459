//! Record host contract
//!
//! The attachment engine never owns record state. It reads and writes the
//! attribute through these traits and the host drives the phase hooks.

use crate::error::RecordError;
use crate::value::Value;

/// Scenario names used by the default attachment configuration
pub const SCENARIO_INSERT: &str = "insert";
pub const SCENARIO_UPDATE: &str = "update";

/// Notifications fired by attachments back into the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordEvent {
    /// A file was committed to its permanent path
    AfterUpload { attribute: String },
}

/// A record whose attributes can carry attached files
pub trait RecordHost: Send + Sync {
    /// Name of the form the record is submitted through (upload lookups use
    /// `form[attribute]`)
    fn form_name(&self) -> &str;

    /// Current value of an attribute or any other readable field
    fn attribute(&self, name: &str) -> Option<&Value>;

    fn set_attribute(&mut self, name: &str, value: Value);

    /// Restore the persisted value and drop the attribute from the write set
    fn unset_attribute(&mut self, name: &str);

    /// Value as last persisted
    fn old_attribute(&self, name: &str) -> Option<&Value>;

    fn is_attribute_changed(&self, name: &str) -> bool;

    fn scenario(&self) -> &str;

    fn is_new_record(&self) -> bool;

    fn has_errors(&self, attribute: &str) -> bool;

    /// Run the validation rules of a single attribute
    fn validate_attribute(&mut self, attribute: &str) -> bool;

    fn trigger_event(&mut self, event: RecordEvent);
}

/// Hosts that can run their whole validate / persist / remove cycle
pub trait Persistable: RecordHost {
    /// Run every validation rule; true when the record is valid
    fn validate(&mut self) -> bool;

    /// Write the current attribute values
    fn persist(&mut self) -> Result<(), RecordError>;

    /// Remove the record
    fn remove(&mut self) -> Result<(), RecordError>;
}
