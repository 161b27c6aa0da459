//! Importing files from URLs and local paths
//!
//! Content is staged in a temp file, typed from its bytes, validated through
//! the host and then copied into place. A staged file that is not committed
//! is removed when its [`StagedImport`] is dropped.

use std::path::{Path, PathBuf};

use fb_core::{RecordHost, UploadedFile, Value};
use tempfile::TempPath;
use tokio::fs;
use tracing::{debug, info, instrument, warn};
use url::Url;
use uuid::Uuid;

use crate::backend::{HttpFetcher, MimeRegistry};
use crate::config::AttachmentConfig;
use crate::error::{AttachmentError, AttachmentResult};
use crate::janitor;
use crate::lifecycle::{FileAttachment, LifecycleState, Operation};
use crate::naming;

/// Basename used when a URL has no usable path segment
const DEFAULT_URL_NAME: &str = "download";

/// Bytes staged for validation
#[derive(Debug)]
pub struct StagedImport {
    temp: TempPath,
    /// Detected content type
    pub mime_type: String,
    /// Reconciled extension, without the dot
    pub extension: Option<String>,
    /// Candidate filename
    pub name: String,
    pub size: u64,
}

impl StagedImport {
    pub fn path(&self) -> &Path {
        &self.temp
    }

    /// Upload value pointing at the staged bytes
    pub fn to_upload(&self) -> UploadedFile {
        UploadedFile::new(&self.name, self.path())
            .with_mime_type(&self.mime_type)
            .with_size(self.size)
    }
}

/// Pick the stored extension: the source's own if the content type allows
/// it, else the content type's preferred one, else the source's.
pub fn reconcile_extension(source: Option<&str>, candidates: &[String]) -> Option<String> {
    let source = source
        .map(|e| e.trim_start_matches('.').to_lowercase())
        .filter(|e| !e.is_empty());
    let compatible = source
        .as_ref()
        .is_some_and(|ext| candidates.iter().any(|c| c == ext));
    if compatible {
        source
    } else {
        candidates.first().cloned().or(source)
    }
}

/// Last non-empty path segment of `url`
pub fn url_basename(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed.path_segments().and_then(|segments| {
                segments
                    .filter(|s| !s.is_empty())
                    .last()
                    .map(str::to_string)
            })
        })
        .unwrap_or_else(|| DEFAULT_URL_NAME.to_string())
}

/// Stages remote and local files for one attachment
pub struct StagingImporter<'a> {
    config: &'a AttachmentConfig,
    mime: &'a dyn MimeRegistry,
    fetcher: Option<&'a dyn HttpFetcher>,
}

impl<'a> StagingImporter<'a> {
    pub fn new(
        config: &'a AttachmentConfig,
        mime: &'a dyn MimeRegistry,
        fetcher: Option<&'a dyn HttpFetcher>,
    ) -> Self {
        Self {
            config,
            mime,
            fetcher,
        }
    }

    /// Download `url` into the temp folder
    #[instrument(skip(self))]
    pub async fn stage_url(&self, url: &str) -> AttachmentResult<StagedImport> {
        let fetcher = self.fetcher.ok_or_else(|| {
            AttachmentError::NotSupported("no HTTP fetcher configured".to_string())
        })?;

        let response = fetcher.get(url).await?;
        if !response.is_success() {
            return Err(AttachmentError::Fetch {
                url: url.to_string(),
                status: Some(response.status),
                message: format!("unexpected status {}", response.status),
            });
        }

        let (id, temp) = self.reserve().await?;
        fs::write(&temp, &response.body)
            .await
            .map_err(|e| AttachmentError::io(&*temp, e))?;
        self.describe(id, temp, &url_basename(url)).await
    }

    /// Copy a local file into the temp folder
    #[instrument(skip(self))]
    pub async fn stage_file(&self, source: &Path) -> AttachmentResult<StagedImport> {
        if !janitor::is_file(source).await {
            return Err(AttachmentError::NotFound(source.to_path_buf()));
        }

        let (id, temp) = self.reserve().await?;
        fs::copy(source, &temp)
            .await
            .map_err(|e| AttachmentError::io(source, e))?;
        let source_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| id.clone());
        self.describe(id, temp, &source_name).await
    }

    /// Fresh temp path, guarded before anything is written to it
    async fn reserve(&self) -> AttachmentResult<(String, TempPath)> {
        janitor::ensure_dir(&self.config.temp_folder).await?;
        let id = Uuid::new_v4().simple().to_string();
        let path: PathBuf = self.config.temp_folder.join(&id);
        let temp = TempPath::try_from_path(&path).map_err(|e| AttachmentError::io(&path, e))?;
        Ok((id, temp))
    }

    async fn describe(
        &self,
        id: String,
        temp: TempPath,
        source_name: &str,
    ) -> AttachmentResult<StagedImport> {
        let mime_type = self.mime.detect(&temp).await?;
        let size = fs::metadata(&temp)
            .await
            .map_err(|e| AttachmentError::io(&*temp, e))?
            .len();

        let source = Path::new(source_name);
        let source_ext = source.extension().and_then(|e| e.to_str());
        let extension = reconcile_extension(source_ext, &self.mime.extensions_for(&mime_type));

        let stem = if self.config.name_strategy.generates_names() {
            id
        } else {
            source
                .file_stem()
                .and_then(|s| s.to_str())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .unwrap_or(id)
        };
        let name = match &extension {
            Some(ext) => naming::sanitize(&format!("{}.{}", stem, ext)),
            None => naming::sanitize(&stem),
        };

        debug!(mime = %mime_type, name = %name, size, "Import staged");
        Ok(StagedImport {
            temp,
            mime_type,
            extension,
            name,
            size,
        })
    }
}

impl FileAttachment {
    fn importer(&self) -> StagingImporter<'_> {
        let collaborators = self.collaborators();
        StagingImporter::new(
            self.config(),
            collaborators.mime.as_ref(),
            collaborators.fetcher.as_deref(),
        )
    }

    /// Import a remote file into the attribute.
    ///
    /// Returns `Ok(false)` when the host's validation rejects the file.
    #[instrument(skip(self, record, op), fields(attribute = %self.attribute()))]
    pub async fn upload_from_url(
        &self,
        record: &mut dyn RecordHost,
        op: &mut Operation,
        url: &str,
    ) -> AttachmentResult<bool> {
        let staged = self.importer().stage_url(url).await?;
        self.stage_and_validate(record, op, staged).await
    }

    /// Import a local file into the attribute
    #[instrument(skip(self, record, op), fields(attribute = %self.attribute()))]
    pub async fn upload_from_file(
        &self,
        record: &mut dyn RecordHost,
        op: &mut Operation,
        path: &Path,
    ) -> AttachmentResult<bool> {
        let staged = self.importer().stage_file(path).await?;
        self.stage_and_validate(record, op, staged).await
    }

    async fn stage_and_validate(
        &self,
        record: &mut dyn RecordHost,
        op: &mut Operation,
        staged: StagedImport,
    ) -> AttachmentResult<bool> {
        let attribute = self.attribute();
        let previous = record.attribute(attribute).cloned();
        let file = staged.to_upload();

        record.set_attribute(attribute, Value::Upload(file.clone()));
        if !record.validate_attribute(attribute) {
            restore(record, attribute, previous);
            warn!(name = %file.name, "Import rejected by validation");
            return Ok(false);
        }

        if let Err(e) = self.copy_into_place(&*record, &file).await {
            restore(record, attribute, previous);
            warn!(error = %e, "Import rolled back");
            return Err(e);
        }

        op.pending = Some(file);
        op.importing = true;
        op.staged = Some(staged);
        op.state = LifecycleState::Validated { ok: true };
        info!("Import committed");
        Ok(true)
    }

    async fn copy_into_place(
        &self,
        record: &dyn RecordHost,
        file: &UploadedFile,
    ) -> AttachmentResult<()> {
        let path = self
            .upload_path(record, self.attribute(), false)?
            .ok_or_else(|| AttachmentError::config("import produced no filename"))?;
        if let Some(dir) = path.parent() {
            janitor::ensure_dir(dir).await?;
        }
        fs::copy(&file.temp_path, &path)
            .await
            .map_err(|e| AttachmentError::io(&path, e))?;
        Ok(())
    }
}

fn restore(record: &mut dyn RecordHost, attribute: &str, previous: Option<Value>) {
    match previous {
        Some(value) => record.set_attribute(attribute, value),
        None => record.unset_attribute(attribute),
    }
}
