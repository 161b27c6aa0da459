//! External collaborators
//!
//! The engine only talks to these traits. Default adapters live in the
//! submodules; tests use the in-memory fakes.

pub mod fetcher;
pub mod imaging;
pub mod mime;

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;

use crate::config::{Color, FitMode};
use crate::error::AttachmentResult;

pub use fetcher::{MemoryFetcher, ReqwestFetcher};
pub use imaging::{ImageCrateBackend, MemoryImageBackend};
pub use mime::InferMimeRegistry;

/// Response of a remote fetch
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client used by URL imports
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    /// GET `url`. Transport failures are errors, HTTP statuses are not.
    async fn get(&self, url: &str) -> AttachmentResult<FetchResponse>;

    /// Get fetcher name for logging
    fn name(&self) -> &str;
}

/// Content type detection and extension lookup
#[async_trait]
pub trait MimeRegistry: Send + Sync {
    /// MIME type of the file's content
    async fn detect(&self, path: &Path) -> AttachmentResult<String>;

    /// Extensions registered for `mime`, preferred first
    fn extensions_for(&self, mime: &str) -> Vec<String>;
}

/// Pixel size of an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Fully resolved thumbnail job
#[derive(Debug, Clone, PartialEq)]
pub struct ThumbRequest {
    pub width: u32,
    pub height: u32,
    pub mode: FitMode,
    pub background: Color,
    pub quality: u8,
}

/// Image manipulation backend
#[async_trait]
pub trait ImageBackend: Send + Sync {
    async fn dimensions(&self, path: &Path) -> AttachmentResult<Dimensions>;

    /// Render `source` into `target` according to `request`
    async fn thumbnail(
        &self,
        source: &Path,
        target: &Path,
        request: &ThumbRequest,
    ) -> AttachmentResult<()>;

    /// Get backend name for logging
    fn name(&self) -> &str;
}
