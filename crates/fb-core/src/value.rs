//! Attribute values
//!
//! A record attribute holds either a scalar or, while an upload is in flight,
//! the uploaded file itself.

use std::fmt;

use crate::upload::UploadedFile;

/// Value of a record attribute
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    /// An upload that has not been committed yet
    Upload(UploadedFile),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_upload(&self) -> Option<&UploadedFile> {
        match self {
            Value::Upload(file) => Some(file),
            _ => None,
        }
    }

    pub fn is_upload(&self) -> bool {
        matches!(self, Value::Upload(_))
    }

    /// Text used when the value is substituted into a path template.
    ///
    /// Only strings and numbers have one.
    pub fn as_path_segment(&self) -> Option<String> {
        match self {
            Value::String(s) => Some(s.clone()),
            Value::Integer(i) => Some(i.to_string()),
            Value::Float(f) => Some(f.to_string()),
            _ => None,
        }
    }

    /// Stored filename carried by this value, if any.
    ///
    /// Empty strings count as "no file".
    pub fn file_name(&self) -> Option<&str> {
        match self {
            Value::String(s) if !s.is_empty() => Some(s),
            Value::Upload(file) if !file.name.is_empty() => Some(&file.name),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::String(s) => write!(f, "{}", s),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Upload(file) => write!(f, "{}", file.name),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<UploadedFile> for Value {
    fn from(file: UploadedFile) -> Self {
        Value::Upload(file)
    }
}
