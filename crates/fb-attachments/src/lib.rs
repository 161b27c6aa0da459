//! # fb-attachments
//!
//! Binds record attributes to files on disk.
//!
//! This crate provides:
//! - Path and URL templates with record placeholders and `@alias` prefixes
//! - File naming and sanitizing
//! - The attachment lifecycle (`FileAttachment`) driven by the host's phases
//! - Imports from URLs and local paths, staged and validated before commit
//! - Image attachments with eager, lazy and placeholder thumbnails
//! - Adapters for the `image` crate, `reqwest` and content sniffing

pub mod backend;
pub mod config;
pub mod error;
pub mod image_attachment;
pub mod import;
pub mod janitor;
pub mod lifecycle;
pub mod naming;
pub mod path;
pub mod set;
pub mod thumbs;

pub use backend::{
    Dimensions, FetchResponse, HttpFetcher, ImageBackend, ImageCrateBackend, InferMimeRegistry,
    MemoryFetcher, MemoryImageBackend, MimeRegistry, ReqwestFetcher, ThumbRequest,
};
pub use config::{
    AttachmentConfig, Color, FitMode, NameStrategy, PathTemplate, Placeholder, ThumbConfig,
    ThumbProfile,
};
pub use error::{AttachmentError, AttachmentResult};
pub use image_attachment::ImageAttachment;
pub use import::{StagedImport, StagingImporter};
pub use lifecycle::{
    Attachable, AttachmentHooks, Collaborators, FileAttachment, LifecycleState, NoHooks,
    Operation,
};
pub use path::PathResolver;
pub use set::{AttachmentSet, SetOperation};
pub use thumbs::ThumbnailEngine;
