//! Content type detection

use std::path::Path;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncReadExt;

use super::MimeRegistry;
use crate::error::{AttachmentError, AttachmentResult};

/// Bytes read from the head of a file for sniffing
const SNIFF_LEN: u64 = 8192;

pub const OCTET_STREAM: &str = "application/octet-stream";

/// Extensions preferred over the registry's alphabetical order
const PREFERRED: &[(&str, &str)] = &[("text/plain", "txt"), ("image/svg+xml", "svg")];

/// Sniffs magic bytes with `infer`, looks extensions up with `mime_guess`
#[derive(Debug, Clone, Copy, Default)]
pub struct InferMimeRegistry;

impl InferMimeRegistry {
    pub fn new() -> Self {
        Self
    }

    /// MIME type of a content prefix
    pub fn detect_bytes(head: &[u8]) -> String {
        if let Some(kind) = infer::get(head) {
            return kind.mime_type().to_string();
        }
        if !head.is_empty() && std::str::from_utf8(head).is_ok() {
            return "text/plain".to_string();
        }
        OCTET_STREAM.to_string()
    }
}

#[async_trait]
impl MimeRegistry for InferMimeRegistry {
    async fn detect(&self, path: &Path) -> AttachmentResult<String> {
        let file = fs::File::open(path)
            .await
            .map_err(|e| AttachmentError::io(path, e))?;
        let mut head = Vec::with_capacity(SNIFF_LEN as usize);
        file.take(SNIFF_LEN)
            .read_to_end(&mut head)
            .await
            .map_err(|e| AttachmentError::io(path, e))?;
        Ok(Self::detect_bytes(&head))
    }

    fn extensions_for(&self, mime: &str) -> Vec<String> {
        let mime = mime.trim().to_ascii_lowercase();
        let mut extensions: Vec<String> = mime_guess::get_mime_extensions_str(&mime)
            .map(|exts| exts.iter().map(|e| e.to_string()).collect())
            .unwrap_or_default();

        let preferred = PREFERRED
            .iter()
            .find(|(m, _)| *m == mime)
            .map(|(_, ext)| ext.to_string())
            .or_else(|| mime.split('/').nth(1).map(str::to_string));
        if let Some(preferred) = preferred {
            if let Some(pos) = extensions.iter().position(|e| *e == preferred) {
                let ext = extensions.remove(pos);
                extensions.insert(0, ext);
            }
        }
        extensions
    }
}
