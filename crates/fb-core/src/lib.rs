//! # fb-core
//!
//! Core types and traits for filebind.
//!
//! This crate provides the contract between an embedding application and the
//! attachment engine:
//! - Attribute values (`Value`)
//! - The record host contract (`RecordHost`, `Persistable`)
//! - The upload abstraction (`UploadedFile`, `UploadSource`)
//! - Validation error collection
//! - Configuration types
//! - In-memory implementations (`MemoryRecord`, `MemoryUploadSource`)

pub mod config;
pub mod error;
pub mod record;
pub mod traits;
pub mod upload;
pub mod value;

pub use error::*;
pub use record::{rules, MemoryRecord, Rule};
pub use traits::*;
pub use upload::{MemoryUploadSource, UploadSource, UploadedFile};
pub use value::Value;
