//! Attachment lifecycle
//!
//! A [`FileAttachment`] binds one record attribute to a file on disk. The host
//! drives it through the phase hooks, threading an [`Operation`] that carries
//! the state of a single save or import pass.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use fb_core::{RecordEvent, RecordHost, UploadSource, UploadedFile, Value};
use tracing::{debug, info, instrument};

use crate::backend::{HttpFetcher, ImageBackend, InferMimeRegistry, MimeRegistry};
use crate::config::AttachmentConfig;
use crate::error::{AttachmentError, AttachmentResult};
use crate::image_attachment::ImageAttachment;
use crate::import::StagedImport;
use crate::janitor;
use crate::naming;
use crate::path::PathResolver;

/// Where an operation is in the lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    #[default]
    Idle,
    /// An incoming file was captured and named
    PendingValidate,
    Validated {
        ok: bool,
    },
    /// The attribute holds the new filename, the file is not on disk yet
    Committing,
    Committed,
    /// Validation failed and the attribute was restored
    RolledBack,
}

/// State of one save or import pass.
///
/// Created fresh for every pass and never stored on the attachment.
#[derive(Debug, Default)]
pub struct Operation {
    pub(crate) pending: Option<UploadedFile>,
    pub(crate) importing: bool,
    pub(crate) staged: Option<StagedImport>,
    pub(crate) state: LifecycleState,
}

impl Operation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// File waiting to be committed
    pub fn pending(&self) -> Option<&UploadedFile> {
        self.pending.as_ref()
    }

    pub fn is_importing(&self) -> bool {
        self.importing
    }

    /// Drop the pending file and any staged temp file
    pub(crate) fn discard(&mut self) {
        self.pending = None;
        self.importing = false;
        self.staged = None;
    }
}

/// External collaborators shared by the attachments of a record type
#[derive(Clone)]
pub struct Collaborators {
    pub uploads: Arc<dyn UploadSource>,
    pub fetcher: Option<Arc<dyn HttpFetcher>>,
    pub mime: Arc<dyn MimeRegistry>,
    pub images: Option<Arc<dyn ImageBackend>>,
}

impl Collaborators {
    pub fn new(uploads: Arc<dyn UploadSource>) -> Self {
        Self {
            uploads,
            fetcher: None,
            mime: Arc::new(InferMimeRegistry::new()),
            images: None,
        }
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn HttpFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn with_mime_registry(mut self, mime: Arc<dyn MimeRegistry>) -> Self {
        self.mime = mime;
        self
    }

    pub fn with_image_backend(mut self, images: Arc<dyn ImageBackend>) -> Self {
        self.images = Some(images);
        self
    }
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators")
            .field("fetcher", &self.fetcher.as_ref().map(|x| x.name()))
            .field("images", &self.images.as_ref().map(|x| x.name()))
            .finish_non_exhaustive()
    }
}

/// Override points for attachments that own derived files
#[async_trait]
pub trait AttachmentHooks: Send + Sync {
    /// Remove files derived from the stored file
    async fn delete_variants(
        &self,
        _record: &dyn RecordHost,
        _attribute: &str,
        _use_old: bool,
    ) -> AttachmentResult<()> {
        Ok(())
    }

    /// Called after the file was committed and the host notified
    async fn after_upload(&self, _record: &dyn RecordHost) -> AttachmentResult<()> {
        Ok(())
    }
}

/// Hooks of a plain file attachment
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl AttachmentHooks for NoHooks {}

/// Capability shared by plain and image attachments
#[async_trait]
pub trait Attachable: Send + Sync {
    /// The wrapped plain attachment
    fn base(&self) -> &FileAttachment;

    fn attribute(&self) -> &str {
        self.base().attribute()
    }

    fn as_image(&self) -> Option<&ImageAttachment> {
        None
    }

    fn before_validate(&self, record: &mut dyn RecordHost, op: &mut Operation);

    fn after_validate(&self, record: &mut dyn RecordHost, op: &mut Operation);

    async fn before_save(
        &self,
        record: &mut dyn RecordHost,
        op: &mut Operation,
    ) -> AttachmentResult<()>;

    async fn after_save(
        &self,
        record: &mut dyn RecordHost,
        op: &mut Operation,
    ) -> AttachmentResult<()>;

    async fn after_delete(&self, record: &mut dyn RecordHost) -> AttachmentResult<()>;

    async fn upload_from_url(
        &self,
        record: &mut dyn RecordHost,
        op: &mut Operation,
        url: &str,
    ) -> AttachmentResult<bool> {
        self.base().upload_from_url(record, op, url).await
    }

    async fn upload_from_file(
        &self,
        record: &mut dyn RecordHost,
        op: &mut Operation,
        path: &Path,
    ) -> AttachmentResult<bool> {
        self.base().upload_from_file(record, op, path).await
    }
}

/// Filename stored in `attribute`, current or as persisted
pub fn stored_name(record: &dyn RecordHost, attribute: &str, use_old: bool) -> Option<String> {
    let value = if use_old {
        record.old_attribute(attribute)
    } else {
        record.attribute(attribute)
    };
    value.and_then(Value::file_name).map(str::to_string)
}

/// Binding of one attribute to a stored file
#[derive(Debug)]
pub struct FileAttachment {
    config: AttachmentConfig,
    resolver: PathResolver,
    collaborators: Collaborators,
}

impl FileAttachment {
    pub fn new(config: AttachmentConfig, collaborators: Collaborators) -> AttachmentResult<Self> {
        config.validate()?;
        let resolver = PathResolver::new(config.aliases.clone());
        Ok(Self {
            config,
            resolver,
            collaborators,
        })
    }

    pub fn config(&self) -> &AttachmentConfig {
        &self.config
    }

    pub fn attribute(&self) -> &str {
        &self.config.attribute
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    /// Whether uploads are picked up in the record's current scenario
    pub fn is_active(&self, record: &dyn RecordHost) -> bool {
        let scenario = record.scenario();
        self.config.scenarios.iter().any(|s| s == scenario)
    }

    /// Full path of the stored file
    pub fn upload_path(
        &self,
        record: &dyn RecordHost,
        attribute: &str,
        use_old: bool,
    ) -> AttachmentResult<Option<PathBuf>> {
        let Some(name) = stored_name(record, attribute, use_old) else {
            return Ok(None);
        };
        let dir = self.resolver.resolve(&self.config.path, record)?;
        Ok(Some(PathBuf::from(dir).join(name)))
    }

    /// Public URL of the stored file, current or as persisted
    pub fn upload_url(
        &self,
        record: &dyn RecordHost,
        attribute: &str,
        use_old: bool,
    ) -> AttachmentResult<Option<String>> {
        let Some(name) = stored_name(record, attribute, use_old) else {
            return Ok(None);
        };
        let url = self.resolver.resolve(&self.config.url, record)?;
        Ok(Some(format!("{}/{}", url.trim_end_matches('/'), name)))
    }

    /// Delete the stored file
    pub async fn delete_file(
        &self,
        record: &dyn RecordHost,
        attribute: &str,
        use_old: bool,
    ) -> AttachmentResult<()> {
        self.delete_file_with(record, attribute, use_old, &NoHooks)
            .await
    }

    /// Delete derived files, then the stored file, then prune its directory
    pub(crate) async fn delete_file_with(
        &self,
        record: &dyn RecordHost,
        attribute: &str,
        use_old: bool,
        hooks: &dyn AttachmentHooks,
    ) -> AttachmentResult<()> {
        hooks.delete_variants(record, attribute, use_old).await?;

        let Some(path) = self.upload_path(record, attribute, use_old)? else {
            return Ok(());
        };
        janitor::delete_file(&path).await?;
        if self.config.delete_empty_dir {
            if let Some(dir) = path.parent() {
                janitor::prune_if_empty(dir).await?;
            }
        }
        Ok(())
    }

    pub(crate) fn before_validate_with(&self, record: &mut dyn RecordHost, op: &mut Operation) {
        if !self.is_active(record) {
            return;
        }
        let attribute = self.attribute();

        let incoming = match record.attribute(attribute) {
            Some(Value::Upload(file)) => Some(file.clone()),
            _ if self.config.instance_by_name => {
                self.collaborators.uploads.instance_by_name(attribute)
            }
            _ => self.collaborators.uploads.instance(&*record, attribute),
        };

        if let Some(mut file) = incoming {
            file.name = naming::file_name(&self.config.name_strategy, &file, op.importing);
            debug!(attribute, name = %file.name, "Upload captured");
            record.set_attribute(attribute, Value::Upload(file.clone()));
            op.pending = Some(file);
            op.state = LifecycleState::PendingValidate;
        }
    }

    pub(crate) fn after_validate_with(&self, record: &mut dyn RecordHost, op: &mut Operation) {
        let attribute = self.attribute();
        if !record.has_errors(attribute) {
            op.state = LifecycleState::Validated { ok: true };
            return;
        }

        if self.config.restore_value_after_failed_validation {
            let old = record.old_attribute(attribute).cloned().unwrap_or_default();
            record.set_attribute(attribute, old);
            op.discard();
            op.state = LifecycleState::RolledBack;
            debug!(attribute, "Validation failed, value restored");
        } else {
            op.state = LifecycleState::Validated { ok: false };
        }
    }

    pub(crate) async fn before_save_with(
        &self,
        record: &mut dyn RecordHost,
        op: &mut Operation,
        hooks: &dyn AttachmentHooks,
    ) -> AttachmentResult<()> {
        let attribute = self.attribute();

        // A staged import commits in any scenario
        let importing = op.importing && op.pending.is_some();
        if !importing && !self.is_active(record) {
            return self.unlink_superseded(record, hooks).await;
        }

        match &op.pending {
            Some(file) => {
                let name = file.name.clone();
                self.unlink_superseded(record, hooks).await?;
                record.set_attribute(attribute, Value::String(name));
                op.state = LifecycleState::Committing;
            }
            None if !op.importing => record.unset_attribute(attribute),
            None => {}
        }
        Ok(())
    }

    async fn unlink_superseded(
        &self,
        record: &dyn RecordHost,
        hooks: &dyn AttachmentHooks,
    ) -> AttachmentResult<()> {
        let attribute = self.attribute();
        if self.config.unlink_on_save
            && !record.is_new_record()
            && record.is_attribute_changed(attribute)
        {
            debug!(attribute, "Removing superseded file");
            self.delete_file_with(record, attribute, true, hooks).await?;
        }
        Ok(())
    }

    #[instrument(skip(self, record, op, hooks), fields(attribute = %self.config.attribute))]
    pub(crate) async fn after_save_with(
        &self,
        record: &mut dyn RecordHost,
        op: &mut Operation,
        hooks: &dyn AttachmentHooks,
    ) -> AttachmentResult<()> {
        let Some(file) = op.pending.take() else {
            return Ok(());
        };
        let attribute = self.attribute();

        let path = self.upload_path(&*record, attribute, false)?.ok_or_else(|| {
            AttachmentError::config(format!("attribute '{}' holds no filename", attribute))
        })?;
        if let Some(dir) = path.parent() {
            janitor::ensure_dir(dir).await?;
        }
        file.save_as(&path, self.config.delete_temp_file)
            .await
            .map_err(|e| AttachmentError::io(&path, e))?;

        op.staged = None;
        op.importing = false;
        op.state = LifecycleState::Committed;
        info!(path = %path.display(), "File committed");

        record.trigger_event(RecordEvent::AfterUpload {
            attribute: attribute.to_string(),
        });
        hooks.after_upload(&*record).await
    }

    #[instrument(skip(self, record, hooks), fields(attribute = %self.config.attribute))]
    pub(crate) async fn after_delete_with(
        &self,
        record: &dyn RecordHost,
        hooks: &dyn AttachmentHooks,
    ) -> AttachmentResult<()> {
        if self.config.unlink_on_delete {
            self.delete_file_with(record, self.attribute(), false, hooks)
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Attachable for FileAttachment {
    fn base(&self) -> &FileAttachment {
        self
    }

    fn before_validate(&self, record: &mut dyn RecordHost, op: &mut Operation) {
        self.before_validate_with(record, op)
    }

    fn after_validate(&self, record: &mut dyn RecordHost, op: &mut Operation) {
        self.after_validate_with(record, op)
    }

    async fn before_save(
        &self,
        record: &mut dyn RecordHost,
        op: &mut Operation,
    ) -> AttachmentResult<()> {
        self.before_save_with(record, op, &NoHooks).await
    }

    async fn after_save(
        &self,
        record: &mut dyn RecordHost,
        op: &mut Operation,
    ) -> AttachmentResult<()> {
        self.after_save_with(record, op, &NoHooks).await
    }

    async fn after_delete(&self, record: &mut dyn RecordHost) -> AttachmentResult<()> {
        self.after_delete_with(&*record, &NoHooks).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NameStrategy;
    use fb_core::{rules, MemoryRecord, MemoryUploadSource, Persistable};
    use tokio::fs;

    struct Fixture {
        root: tempfile::TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                root: tempfile::tempdir().unwrap(),
            }
        }

        fn config(&self) -> AttachmentConfig {
            let path = format!("{}/users/{{id}}", self.root.path().display());
            AttachmentConfig::new("avatar", path, "/uploads/users/{id}")
        }

        async fn upload(&self, name: &str, body: &[u8]) -> UploadedFile {
            let temp = self.root.path().join(format!("php-{}", name.len()));
            fs::write(&temp, body).await.unwrap();
            UploadedFile::new(name, temp).with_size(body.len() as u64)
        }

        fn user_dir(&self, id: i64) -> PathBuf {
            self.root.path().join("users").join(id.to_string())
        }
    }

    fn attachment(config: AttachmentConfig, uploads: MemoryUploadSource) -> FileAttachment {
        FileAttachment::new(config, Collaborators::new(Arc::new(uploads))).unwrap()
    }

    async fn save(
        attachment: &FileAttachment,
        record: &mut MemoryRecord,
        op: &mut Operation,
    ) -> AttachmentResult<bool> {
        attachment.before_validate(record, op);
        let valid = record.validate();
        attachment.after_validate(record, op);
        if !valid {
            return Ok(false);
        }
        attachment.before_save(record, op).await?;
        record.persist()?;
        attachment.after_save(record, op).await?;
        Ok(true)
    }

    #[test]
    fn test_construction_requires_config() {
        let result = FileAttachment::new(
            AttachmentConfig::new("avatar", "", "/u"),
            Collaborators::new(Arc::new(MemoryUploadSource::new())),
        );
        assert!(matches!(result, Err(AttachmentError::Config(_))));
    }

    #[tokio::test]
    async fn test_commit_round_trip() {
        let fx = Fixture::new();
        let file = fx.upload("my photo.png", b"png-bytes").await;
        let temp = file.temp_path.clone();
        let uploads = MemoryUploadSource::new().with_form_file("User", "avatar", file);
        let attachment = attachment(fx.config(), uploads);

        let mut record = MemoryRecord::new("User").with_attribute("id", 7i64);
        let mut op = Operation::new();
        assert!(save(&attachment, &mut record, &mut op).await.unwrap());

        assert_eq!(op.state(), LifecycleState::Committed);
        assert_eq!(record.attribute("avatar"), Some(&Value::from("my-photo.png")));
        let path = attachment
            .upload_path(&record, "avatar", false)
            .unwrap()
            .unwrap();
        assert_eq!(path.file_name().unwrap(), "my-photo.png");
        assert_eq!(path.parent().unwrap(), fx.user_dir(7));
        assert_eq!(fs::read(&path).await.unwrap(), b"png-bytes");
        assert!(!temp.exists());
        assert_eq!(
            record.events(),
            &[RecordEvent::AfterUpload {
                attribute: "avatar".to_string()
            }]
        );
        assert_eq!(
            attachment.upload_url(&record, "avatar", true).unwrap().as_deref(),
            Some("/uploads/users/7/my-photo.png")
        );
    }

    #[test]
    fn test_upload_url_old_and_current() {
        let fx = Fixture::new();
        let attachment = attachment(fx.config(), MemoryUploadSource::new());
        let mut record = MemoryRecord::new("User")
            .with_attribute("id", 2i64)
            .with_attribute("avatar", "a.png")
            .into_persisted();
        record.set_attribute("avatar", Value::from("b.png"));

        assert_eq!(
            attachment.upload_url(&record, "avatar", true).unwrap().as_deref(),
            Some("/uploads/users/2/a.png")
        );
        assert_eq!(
            attachment.upload_url(&record, "avatar", false).unwrap().as_deref(),
            Some("/uploads/users/2/b.png")
        );
        record.set_attribute("avatar", Value::Null);
        assert_eq!(attachment.upload_url(&record, "avatar", false).unwrap(), None);
    }

    #[tokio::test]
    async fn test_keep_temp_file_copies() {
        let fx = Fixture::new();
        let file = fx.upload("a.txt", b"a").await;
        let temp = file.temp_path.clone();
        let uploads = MemoryUploadSource::new().with_file("avatar", file);
        let config = fx
            .config()
            .with_instance_by_name(true)
            .with_delete_temp_file(false);
        let attachment = attachment(config, uploads);

        let mut record = MemoryRecord::new("User").with_attribute("id", 1i64);
        assert!(save(&attachment, &mut record, &mut Operation::new())
            .await
            .unwrap());
        assert!(temp.exists());
        assert!(fx.user_dir(1).join("a.txt").exists());
    }

    #[tokio::test]
    async fn test_unique_names() {
        let fx = Fixture::new();
        let file = fx.upload("photo.JPG", b"jpg").await;
        let uploads = MemoryUploadSource::new().with_form_file("User", "avatar", file);
        let config = fx.config().with_name_strategy(NameStrategy::GenerateUnique);
        let attachment = attachment(config, uploads);

        let mut record = MemoryRecord::new("User").with_attribute("id", 2i64);
        save(&attachment, &mut record, &mut Operation::new())
            .await
            .unwrap();

        let stored = stored_name(&record, "avatar", false).unwrap();
        assert!(stored.ends_with(".jpg"));
        assert_ne!(stored, "photo.JPG");
        assert!(fx.user_dir(2).join(&stored).exists());
    }

    #[tokio::test]
    async fn test_failed_validation_restores_old_value() {
        let fx = Fixture::new();
        let file = fx.upload("virus.exe", b"MZ").await;
        let uploads = MemoryUploadSource::new().with_form_file("User", "avatar", file);
        let attachment = attachment(fx.config(), uploads);

        let mut record = MemoryRecord::new("User")
            .with_attribute("id", 3i64)
            .with_attribute("avatar", "old.png")
            .with_rule("avatar", rules::extensions(&["png", "jpg"]))
            .into_persisted();
        let mut op = Operation::new();

        assert!(!save(&attachment, &mut record, &mut op).await.unwrap());
        assert_eq!(op.state(), LifecycleState::RolledBack);
        assert!(op.pending().is_none());
        assert_eq!(record.attribute("avatar"), Some(&Value::from("old.png")));
        assert!(!fx.user_dir(3).exists());
    }

    #[tokio::test]
    async fn test_failed_validation_without_restore() {
        let fx = Fixture::new();
        let file = fx.upload("virus.exe", b"MZ").await;
        let uploads = MemoryUploadSource::new().with_form_file("User", "avatar", file);
        let config = fx.config().with_restore_value_after_failed_validation(false);
        let attachment = attachment(config, uploads);

        let mut record = MemoryRecord::new("User")
            .with_attribute("id", 3i64)
            .with_rule("avatar", rules::extensions(&["png"]));
        let mut op = Operation::new();

        assert!(!save(&attachment, &mut record, &mut op).await.unwrap());
        assert_eq!(op.state(), LifecycleState::Validated { ok: false });
        assert!(record.attribute("avatar").unwrap().is_upload());
    }

    #[tokio::test]
    async fn test_replace_unlinks_old_file() {
        let fx = Fixture::new();
        let dir = fx.user_dir(4);
        fs::create_dir_all(&dir).await.unwrap();
        fs::write(dir.join("a.png"), b"old").await.unwrap();

        let file = fx.upload("b.png", b"new").await;
        let uploads = MemoryUploadSource::new().with_form_file("User", "avatar", file);
        let attachment = attachment(fx.config(), uploads);

        let mut record = MemoryRecord::new("User")
            .with_attribute("id", 4i64)
            .with_attribute("avatar", "a.png")
            .into_persisted();
        assert!(save(&attachment, &mut record, &mut Operation::new())
            .await
            .unwrap());

        assert!(!dir.join("a.png").exists());
        assert!(dir.join("b.png").exists());
    }

    #[tokio::test]
    async fn test_replace_keeps_old_file_without_unlink() {
        let fx = Fixture::new();
        let dir = fx.user_dir(5);
        fs::create_dir_all(&dir).await.unwrap();
        fs::write(dir.join("a.png"), b"old").await.unwrap();

        let file = fx.upload("b.png", b"new").await;
        let uploads = MemoryUploadSource::new().with_form_file("User", "avatar", file);
        let attachment = attachment(fx.config().with_unlink_on_save(false), uploads);

        let mut record = MemoryRecord::new("User")
            .with_attribute("id", 5i64)
            .with_attribute("avatar", "a.png")
            .into_persisted();
        save(&attachment, &mut record, &mut Operation::new())
            .await
            .unwrap();

        assert!(dir.join("a.png").exists());
        assert!(dir.join("b.png").exists());
    }

    #[tokio::test]
    async fn test_no_upload_protects_attribute() {
        let fx = Fixture::new();
        let attachment = attachment(fx.config(), MemoryUploadSource::new());

        let mut record = MemoryRecord::new("User")
            .with_attribute("id", 6i64)
            .with_attribute("avatar", "keep.png")
            .into_persisted();
        record.set_attribute("avatar", Value::from("tampered.png"));

        let mut op = Operation::new();
        save(&attachment, &mut record, &mut op).await.unwrap();
        assert_eq!(record.attribute("avatar"), Some(&Value::from("keep.png")));
        assert!(record.events().is_empty());
        assert_eq!(op.state(), LifecycleState::Validated { ok: true });
    }

    #[tokio::test]
    async fn test_inactive_scenario_still_unlinks_changed_file() {
        let fx = Fixture::new();
        let dir = fx.user_dir(8);
        fs::create_dir_all(&dir).await.unwrap();
        fs::write(dir.join("a.png"), b"old").await.unwrap();

        let config = fx.config().with_scenarios(&["insert"]);
        let attachment = attachment(config, MemoryUploadSource::new());

        let mut record = MemoryRecord::new("User")
            .with_attribute("id", 8i64)
            .with_attribute("avatar", "a.png")
            .into_persisted();
        record.set_attribute("avatar", Value::from("other.png"));

        let mut op = Operation::new();
        save(&attachment, &mut record, &mut op).await.unwrap();
        assert!(!dir.join("a.png").exists());
        assert_eq!(record.attribute("avatar"), Some(&Value::from("other.png")));
        assert!(op.pending().is_none());
    }

    #[tokio::test]
    async fn test_after_save_directory_failure_is_fatal() {
        let fx = Fixture::new();
        fs::write(fx.root.path().join("users"), b"not a dir")
            .await
            .unwrap();
        let file = fx.upload("a.png", b"a").await;
        let uploads = MemoryUploadSource::new().with_form_file("User", "avatar", file);
        let attachment = attachment(fx.config(), uploads);

        let mut record = MemoryRecord::new("User").with_attribute("id", 9i64);
        let mut op = Operation::new();
        let err = save(&attachment, &mut record, &mut op).await.unwrap_err();
        assert!(matches!(err, AttachmentError::Io { .. }));
        // the attribute already carries the new name
        assert_eq!(record.attribute("avatar"), Some(&Value::from("a.png")));
        assert_eq!(op.state(), LifecycleState::Committing);
    }

    #[tokio::test]
    async fn test_delete_prunes_empty_directory() {
        let fx = Fixture::new();
        let dir = fx.user_dir(10);
        fs::create_dir_all(&dir).await.unwrap();
        fs::write(dir.join("a.png"), b"a").await.unwrap();

        let attachment = attachment(
            fx.config().with_delete_empty_dir(true),
            MemoryUploadSource::new(),
        );
        let mut record = MemoryRecord::new("User")
            .with_attribute("id", 10i64)
            .with_attribute("avatar", "a.png")
            .into_persisted();

        record.remove().unwrap();
        attachment.after_delete(&mut record).await.unwrap();
        assert!(!dir.exists());

        let path = attachment
            .upload_path(&record, "avatar", false)
            .unwrap()
            .unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_delete_keeps_directory_with_other_files() {
        let fx = Fixture::new();
        let dir = fx.user_dir(11);
        fs::create_dir_all(&dir).await.unwrap();
        fs::write(dir.join("a.png"), b"a").await.unwrap();
        fs::write(dir.join("other.txt"), b"o").await.unwrap();

        let attachment = attachment(
            fx.config().with_delete_empty_dir(true),
            MemoryUploadSource::new(),
        );
        let mut record = MemoryRecord::new("User")
            .with_attribute("id", 11i64)
            .with_attribute("avatar", "a.png")
            .into_persisted();

        attachment.after_delete(&mut record).await.unwrap();
        assert!(!dir.join("a.png").exists());
        assert!(dir.join("other.txt").exists());
    }

    #[tokio::test]
    async fn test_delete_respects_unlink_on_delete() {
        let fx = Fixture::new();
        let dir = fx.user_dir(12);
        fs::create_dir_all(&dir).await.unwrap();
        fs::write(dir.join("a.png"), b"a").await.unwrap();

        let attachment = attachment(
            fx.config().with_unlink_on_delete(false),
            MemoryUploadSource::new(),
        );
        let mut record = MemoryRecord::new("User")
            .with_attribute("id", 12i64)
            .with_attribute("avatar", "a.png")
            .into_persisted();

        attachment.after_delete(&mut record).await.unwrap();
        assert!(dir.join("a.png").exists());
    }
}
