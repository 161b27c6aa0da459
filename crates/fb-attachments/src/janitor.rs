//! File and directory cleanup

use std::path::Path;

use tokio::fs;
use tracing::debug;

use crate::error::{AttachmentError, AttachmentResult};

/// Whether `path` is an existing regular file
pub async fn is_file(path: &Path) -> bool {
    fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}

/// Unlink `path` if it is a regular file.
///
/// Returns whether a file was removed. Missing paths and directories are left
/// alone.
pub async fn delete_file(path: &Path) -> AttachmentResult<bool> {
    if !is_file(path).await {
        return Ok(false);
    }
    match fs::remove_file(path).await {
        Ok(()) => {
            debug!(path = %path.display(), "File deleted");
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(AttachmentError::io(path, e)),
    }
}

/// Remove `dir` when it has no entries. Parents are never touched.
pub async fn prune_if_empty(dir: &Path) -> AttachmentResult<bool> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(AttachmentError::io(dir, e)),
    };
    let has_entries = entries
        .next_entry()
        .await
        .map_err(|e| AttachmentError::io(dir, e))?
        .is_some();
    if has_entries {
        return Ok(false);
    }

    fs::remove_dir(dir)
        .await
        .map_err(|e| AttachmentError::io(dir, e))?;
    debug!(dir = %dir.display(), "Empty directory removed");
    Ok(true)
}

/// Create `dir` and its parents
pub async fn ensure_dir(dir: &Path) -> AttachmentResult<()> {
    fs::create_dir_all(dir)
        .await
        .map_err(|e| AttachmentError::io(dir, e))
}
