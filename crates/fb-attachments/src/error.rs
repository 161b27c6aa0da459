//! Attachment errors

use std::path::PathBuf;

use fb_core::RecordError;
use thiserror::Error;

/// Errors raised by attachments
#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Fetch failed for {url}: {message}")]
    Fetch {
        url: String,
        status: Option<u16>,
        message: String,
    },
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Not supported: {0}")]
    NotSupported(String),
    #[error("Image error: {0}")]
    Image(String),
    #[error("Record error: {0}")]
    Record(#[from] RecordError),
}

pub type AttachmentResult<T> = Result<T, AttachmentError>;

impl AttachmentError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
