//! Upload abstraction
//!
//! An uploaded file lives at a temporary path until it is saved to its
//! permanent location. Hosts expose incoming files through [`UploadSource`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;

use crate::traits::RecordHost;

/// A file received from a client (or staged by an import) that has not been
/// committed yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Filename the file will be stored under
    pub name: String,
    /// Where the bytes currently live
    pub temp_path: PathBuf,
    /// Content type, when known
    pub mime_type: Option<String>,
    /// Size in bytes
    pub size: u64,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, temp_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            temp_path: temp_path.into(),
            mime_type: None,
            size: 0,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    /// Lower-cased extension of `name`, without the dot
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .and_then(|s| s.to_str())
            .filter(|ext| !ext.is_empty())
            .map(str::to_lowercase)
    }

    /// Copy (or move, when `delete_original` is set) the file to `path`.
    ///
    /// Saving onto the file's own temp path is a no-op.
    pub async fn save_as(&self, path: &Path, delete_original: bool) -> std::io::Result<()> {
        if self.temp_path == path {
            return Ok(());
        }

        if delete_original {
            match fs::rename(&self.temp_path, path).await {
                Ok(()) => {
                    debug!(from = ?self.temp_path, to = ?path, "Upload moved");
                    return Ok(());
                }
                Err(e) => {
                    debug!(error = %e, "Rename failed, copying instead");
                }
            }
            fs::copy(&self.temp_path, path).await?;
            fs::remove_file(&self.temp_path).await?;
        } else {
            fs::copy(&self.temp_path, path).await?;
        }

        debug!(from = ?self.temp_path, to = ?path, "Upload copied");
        Ok(())
    }
}

/// Source of incoming uploads for the current request
pub trait UploadSource: Send + Sync {
    /// Upload submitted for `attribute` of `record`'s form
    fn instance(&self, record: &dyn RecordHost, attribute: &str) -> Option<UploadedFile>;

    /// Upload submitted under a plain input name
    fn instance_by_name(&self, name: &str) -> Option<UploadedFile>;
}

/// Input name of an attribute inside a form, e.g. `User[avatar]`
pub fn input_name(form_name: &str, attribute: &str) -> String {
    if form_name.is_empty() {
        attribute.to_string()
    } else {
        format!("{}[{}]", form_name, attribute)
    }
}

/// In-memory upload source keyed by input name
#[derive(Debug, Clone, Default)]
pub struct MemoryUploadSource {
    files: HashMap<String, UploadedFile>,
}

impl MemoryUploadSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file under a raw input name
    pub fn with_file(mut self, input_name: impl Into<String>, file: UploadedFile) -> Self {
        self.files.insert(input_name.into(), file);
        self
    }

    /// Register a file for `form[attribute]`
    pub fn with_form_file(self, form_name: &str, attribute: &str, file: UploadedFile) -> Self {
        self.with_file(input_name(form_name, attribute), file)
    }
}

impl UploadSource for MemoryUploadSource {
    fn instance(&self, record: &dyn RecordHost, attribute: &str) -> Option<UploadedFile> {
        self.files
            .get(&input_name(record.form_name(), attribute))
            .cloned()
    }

    fn instance_by_name(&self, name: &str) -> Option<UploadedFile> {
        self.files.get(name).cloned()
    }
}
