//! Image attachments
//!
//! An [`ImageAttachment`] wraps a [`FileAttachment`] and keeps a set of
//! thumbnail variants next to the stored image. Variants are created eagerly
//! after a commit, lazily when their URL is requested, or both.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fb_core::{RecordHost, Value};
use tracing::{debug, instrument};

use crate::config::{AttachmentConfig, PathTemplate, Placeholder, ThumbConfig, ThumbProfile};
use crate::error::{AttachmentError, AttachmentResult};
use crate::janitor;
use crate::lifecycle::{
    stored_name, Attachable, AttachmentHooks, Collaborators, FileAttachment, Operation,
};
use crate::thumbs::{thumb_file_name, ThumbnailEngine};

#[derive(Debug)]
pub struct ImageAttachment {
    base: FileAttachment,
    thumbs: ThumbConfig,
    engine: ThumbnailEngine,
}

impl ImageAttachment {
    /// Fails with `NotSupported` when no image backend is configured
    pub fn new(
        config: AttachmentConfig,
        thumbs: ThumbConfig,
        collaborators: Collaborators,
    ) -> AttachmentResult<Self> {
        let backend = collaborators.images.clone().ok_or_else(|| {
            AttachmentError::NotSupported("image attachments need an image backend".to_string())
        })?;
        thumbs.validate()?;
        let base = FileAttachment::new(config, collaborators)?;

        debug!(
            attribute = base.attribute(),
            backend = backend.name(),
            profiles = thumbs.thumbs.len(),
            "Image attachment configured"
        );
        Ok(Self {
            base,
            thumbs,
            engine: ThumbnailEngine::new(backend),
        })
    }

    pub fn thumb_config(&self) -> &ThumbConfig {
        &self.thumbs
    }

    pub fn engine(&self) -> &ThumbnailEngine {
        &self.engine
    }

    fn thumb_path_template(&self) -> &PathTemplate {
        self.thumbs
            .thumb_path
            .as_ref()
            .unwrap_or(&self.base.config().path)
    }

    fn thumb_url_template(&self) -> &PathTemplate {
        self.thumbs
            .thumb_url
            .as_ref()
            .unwrap_or(&self.base.config().url)
    }

    /// Path of a profile's variant of the stored image
    pub fn thumb_upload_path(
        &self,
        record: &dyn RecordHost,
        attribute: &str,
        profile: &str,
        use_old: bool,
    ) -> AttachmentResult<Option<PathBuf>> {
        self.thumbs.profile(profile)?;
        let Some(name) = stored_name(record, attribute, use_old) else {
            return Ok(None);
        };
        let dir = self
            .base
            .resolver()
            .resolve(self.thumb_path_template(), record)?;
        Ok(Some(PathBuf::from(dir).join(thumb_file_name(profile, &name))))
    }

    /// URL of a profile's variant of the attribute's current image.
    ///
    /// Without an image this is the placeholder's variant, or `None`
    /// without a placeholder. The URL of a stored image is computed, not
    /// checked for existence.
    #[instrument(skip(self, record))]
    pub async fn thumb_upload_url(
        &self,
        record: &dyn RecordHost,
        attribute: &str,
        profile: &str,
    ) -> AttachmentResult<Option<String>> {
        let settings = self.thumbs.profile(profile)?;
        let Some(name) = stored_name(record, attribute, false) else {
            return match &self.thumbs.placeholder {
                Some(placeholder) => self
                    .placeholder_url(placeholder, profile, settings)
                    .await
                    .map(Some),
                None => Ok(None),
            };
        };

        if self.thumbs.create_thumbs_on_request {
            self.create_thumbs(record, Some(profile)).await?;
        }

        let url = self
            .base
            .resolver()
            .resolve(self.thumb_url_template(), record)?;
        Ok(Some(format!(
            "{}/{}",
            url.trim_end_matches('/'),
            thumb_file_name(profile, &name)
        )))
    }

    /// Variant of the placeholder image, rendered beside it on first use
    async fn placeholder_url(
        &self,
        placeholder: &Placeholder,
        profile: &str,
        settings: &ThumbProfile,
    ) -> AttachmentResult<String> {
        let file_name = placeholder
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                AttachmentError::config(format!(
                    "placeholder {} is not a file",
                    placeholder.path.display()
                ))
            })?;
        let thumb = thumb_file_name(profile, &file_name);

        self.engine
            .ensure(&placeholder.path, &placeholder.path.with_file_name(&thumb), settings)
            .await?;

        Ok(match placeholder.url.rsplit_once('/') {
            Some((dir, _)) => format!("{}/{}", dir, thumb),
            None => thumb,
        })
    }

    /// Render missing variants of the stored image, all profiles or `only`.
    ///
    /// Returns the number of variants rendered. The original is removed
    /// afterwards when `delete_original_file` is set and every profile ran.
    #[instrument(skip(self, record), fields(attribute = %self.base.attribute()))]
    pub async fn create_thumbs(
        &self,
        record: &dyn RecordHost,
        only: Option<&str>,
    ) -> AttachmentResult<usize> {
        let attribute = self.base.attribute();
        let Some(original) = self.base.upload_path(record, attribute, false)? else {
            return Ok(0);
        };
        if !janitor::is_file(&original).await {
            debug!(path = %original.display(), "Original missing, no thumbnails");
            return Ok(0);
        }

        let mut created = 0;
        for (name, profile) in &self.thumbs.thumbs {
            if only.is_some_and(|p| p != name.as_str()) {
                continue;
            }
            if let Some(target) = self.thumb_upload_path(record, attribute, name, false)? {
                if self.engine.ensure(&original, &target, profile).await? {
                    created += 1;
                }
            }
        }

        if self.thumbs.delete_original_file && only.is_none() {
            janitor::delete_file(&original).await?;
        }
        Ok(created)
    }

    /// Delete the image and its variants, then clear the attribute
    pub async fn delete_image(
        &self,
        record: &mut dyn RecordHost,
        attribute: &str,
    ) -> AttachmentResult<()> {
        self.base
            .delete_file_with(&*record, attribute, false, self)
            .await?;
        record.set_attribute(attribute, Value::Null);
        Ok(())
    }

    async fn delete_thumbs(
        &self,
        record: &dyn RecordHost,
        attribute: &str,
        use_old: bool,
    ) -> AttachmentResult<Option<PathBuf>> {
        let mut dir = None;
        for profile in self.thumbs.thumbs.keys() {
            if let Some(path) = self.thumb_upload_path(record, attribute, profile, use_old)? {
                janitor::delete_file(&path).await?;
                dir = path.parent().map(Path::to_path_buf);
            }
        }
        Ok(dir)
    }
}

#[async_trait]
impl AttachmentHooks for ImageAttachment {
    async fn delete_variants(
        &self,
        record: &dyn RecordHost,
        attribute: &str,
        use_old: bool,
    ) -> AttachmentResult<()> {
        let Some(thumb_dir) = self.delete_thumbs(record, attribute, use_old).await? else {
            return Ok(());
        };
        if !self.base.config().delete_empty_dir {
            return Ok(());
        }
        let original_dir = self
            .base
            .upload_path(record, attribute, use_old)?
            .and_then(|p| p.parent().map(Path::to_path_buf));
        // the original's directory is pruned once the original is gone
        if original_dir.as_deref() != Some(thumb_dir.as_path()) {
            janitor::prune_if_empty(&thumb_dir).await?;
        }
        Ok(())
    }

    async fn after_upload(&self, record: &dyn RecordHost) -> AttachmentResult<()> {
        if self.thumbs.create_thumbs_on_save {
            self.create_thumbs(record, None).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Attachable for ImageAttachment {
    fn base(&self) -> &FileAttachment {
        &self.base
    }

    fn as_image(&self) -> Option<&ImageAttachment> {
        Some(self)
    }

    fn before_validate(&self, record: &mut dyn RecordHost, op: &mut Operation) {
        self.base.before_validate_with(record, op)
    }

    fn after_validate(&self, record: &mut dyn RecordHost, op: &mut Operation) {
        self.base.after_validate_with(record, op)
    }

    async fn before_save(
        &self,
        record: &mut dyn RecordHost,
        op: &mut Operation,
    ) -> AttachmentResult<()> {
        self.base.before_save_with(record, op, self).await
    }

    async fn after_save(
        &self,
        record: &mut dyn RecordHost,
        op: &mut Operation,
    ) -> AttachmentResult<()> {
        self.base.after_save_with(record, op, self).await
    }

    async fn after_delete(&self, record: &mut dyn RecordHost) -> AttachmentResult<()> {
        self.base.after_delete_with(&*record, self).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::backend::MemoryImageBackend;
    use fb_core::{MemoryRecord, MemoryUploadSource, Persistable, UploadedFile};
    use tokio::fs;

    struct Fixture {
        root: tempfile::TempDir,
        backend: Arc<MemoryImageBackend>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                root: tempfile::tempdir().unwrap(),
                backend: Arc::new(MemoryImageBackend::new().with_default_size(800, 600)),
            }
        }

        fn config(&self) -> AttachmentConfig {
            AttachmentConfig::new(
                "photo",
                format!("{}/photos/{{id}}", self.root.path().display()),
                "/photos/{id}",
            )
        }

        fn thumbs(&self) -> ThumbConfig {
            ThumbConfig::new()
                .with_profiles([
                    ("thumb", ThumbProfile::new(200, 200).with_quality(90)),
                    ("wide", ThumbProfile::fit_width(400)),
                ])
        }

        fn collaborators(&self, uploads: MemoryUploadSource) -> Collaborators {
            Collaborators::new(Arc::new(uploads)).with_image_backend(self.backend.clone())
        }

        fn image(&self, thumbs: ThumbConfig, uploads: MemoryUploadSource) -> ImageAttachment {
            ImageAttachment::new(self.config(), thumbs, self.collaborators(uploads)).unwrap()
        }

        fn dir(&self, id: i64) -> PathBuf {
            self.root.path().join("photos").join(id.to_string())
        }

        async fn upload(&self, name: &str) -> MemoryUploadSource {
            let temp = self.root.path().join(format!("upload-{}", name));
            fs::write(&temp, b"image").await.unwrap();
            MemoryUploadSource::new().with_form_file("Post", "photo", UploadedFile::new(name, temp))
        }

        async fn stored(&self, id: i64, names: &[&str]) {
            let dir = self.dir(id);
            fs::create_dir_all(&dir).await.unwrap();
            for name in names {
                fs::write(dir.join(name), b"x").await.unwrap();
            }
        }
    }

    async fn save(image: &ImageAttachment, record: &mut MemoryRecord) -> AttachmentResult<()> {
        let mut op = Operation::new();
        image.before_validate(record, &mut op);
        assert!(record.validate());
        image.after_validate(record, &mut op);
        image.before_save(record, &mut op).await?;
        record.persist()?;
        image.after_save(record, &mut op).await
    }

    #[test]
    fn test_requires_image_backend() {
        let result = ImageAttachment::new(
            AttachmentConfig::new("photo", "/srv", "/u"),
            ThumbConfig::new(),
            Collaborators::new(Arc::new(MemoryUploadSource::new())),
        );
        assert!(matches!(result, Err(AttachmentError::NotSupported(_))));
    }

    #[test]
    fn test_rejects_empty_profile() {
        let fx = Fixture::new();
        let result = ImageAttachment::new(
            fx.config(),
            ThumbConfig::new().with_profile("bad", ThumbProfile::new(0, 0)),
            fx.collaborators(MemoryUploadSource::new()),
        );
        assert!(matches!(result, Err(AttachmentError::Config(_))));
    }

    #[tokio::test]
    async fn test_eager_thumbnails_on_save() {
        let fx = Fixture::new();
        let image = fx.image(fx.thumbs(), fx.upload("cat.png").await);

        let mut record = MemoryRecord::new("Post").with_attribute("id", 1i64);
        save(&image, &mut record).await.unwrap();

        let dir = fx.dir(1);
        assert!(dir.join("cat.png").exists());
        assert!(dir.join("thumb-cat.png").exists());
        assert!(dir.join("wide-cat.png").exists());

        let calls = fx.backend.calls().await;
        assert_eq!(calls.len(), 2);
        let wide = calls.iter().find(|c| c.target.ends_with("wide-cat.png")).unwrap();
        assert_eq!((wide.request.width, wide.request.height), (400, 300));
        let thumb = calls.iter().find(|c| c.target.ends_with("thumb-cat.png")).unwrap();
        assert_eq!(thumb.request.quality, 90);
    }

    #[tokio::test]
    async fn test_lazy_thumbnails_on_request() {
        let fx = Fixture::new();
        let thumbs = fx
            .thumbs()
            .with_create_thumbs_on_save(false)
            .with_create_thumbs_on_request(true);
        let image = fx.image(thumbs, fx.upload("cat.png").await);

        let mut record = MemoryRecord::new("Post").with_attribute("id", 2i64);
        save(&image, &mut record).await.unwrap();
        assert!(fx.backend.calls().await.is_empty());

        let url = image.thumb_upload_url(&record, "photo", "wide").await.unwrap();
        assert_eq!(url.as_deref(), Some("/photos/2/wide-cat.png"));
        assert!(fx.dir(2).join("wide-cat.png").exists());
        assert!(!fx.dir(2).join("thumb-cat.png").exists());

        image.thumb_upload_url(&record, "photo", "wide").await.unwrap();
        assert_eq!(fx.backend.calls().await.len(), 1);
    }

    #[tokio::test]
    async fn test_url_is_computed_without_file() {
        let fx = Fixture::new();
        let image = fx.image(
            fx.thumbs().with_create_thumbs_on_save(false),
            MemoryUploadSource::new(),
        );

        let record = MemoryRecord::new("Post")
            .with_attribute("id", 3i64)
            .with_attribute("photo", "gone.png")
            .into_persisted();
        let url = image.thumb_upload_url(&record, "photo", "thumb").await.unwrap();
        assert_eq!(url.as_deref(), Some("/photos/3/thumb-gone.png"));
        assert!(fx.backend.calls().await.is_empty());

        let err = image
            .thumb_upload_url(&record, "photo", "missing")
            .await
            .unwrap_err();
        assert!(matches!(err, AttachmentError::Config(_)));
    }

    #[tokio::test]
    async fn test_placeholder_fallback() {
        let fx = Fixture::new();
        let placeholder = fx.root.path().join("static").join("default.png");
        fs::create_dir_all(placeholder.parent().unwrap()).await.unwrap();
        fs::write(&placeholder, b"placeholder").await.unwrap();

        let thumbs = fx.thumbs().with_placeholder(&placeholder, "/static/default.png");
        let image = fx.image(thumbs, MemoryUploadSource::new());
        let record = MemoryRecord::new("Post").with_attribute("id", 4i64);

        let url = image.thumb_upload_url(&record, "photo", "thumb").await.unwrap();
        assert_eq!(url.as_deref(), Some("/static/thumb-default.png"));
        assert!(placeholder.with_file_name("thumb-default.png").exists());

        image.thumb_upload_url(&record, "photo", "thumb").await.unwrap();
        assert_eq!(fx.backend.calls().await.len(), 1);

        let bare = fx.image(fx.thumbs(), MemoryUploadSource::new());
        assert_eq!(bare.thumb_upload_url(&record, "photo", "thumb").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_relative_placeholder_url() {
        let fx = Fixture::new();
        let placeholder = fx.root.path().join("default.png");
        fs::write(&placeholder, b"placeholder").await.unwrap();

        let thumbs = fx.thumbs().with_placeholder(&placeholder, "default.png");
        let image = fx.image(thumbs, MemoryUploadSource::new());
        let record = MemoryRecord::new("Post").with_attribute("id", 4i64);

        let url = image.thumb_upload_url(&record, "photo", "thumb").await.unwrap();
        assert_eq!(url.as_deref(), Some("thumb-default.png"));
    }

    #[tokio::test]
    async fn test_url_follows_rendered_image() {
        let fx = Fixture::new();
        fx.stored(6, &["a.png", "b.png"]).await;
        let thumbs = fx
            .thumbs()
            .with_create_thumbs_on_save(false)
            .with_create_thumbs_on_request(true);
        let image = fx.image(thumbs, MemoryUploadSource::new());

        let mut record = MemoryRecord::new("Post")
            .with_attribute("id", 6i64)
            .with_attribute("photo", "a.png")
            .into_persisted();
        record.set_attribute("photo", Value::from("b.png"));

        let url = image.thumb_upload_url(&record, "photo", "wide").await.unwrap();
        assert_eq!(url.as_deref(), Some("/photos/6/wide-b.png"));
        assert!(fx.dir(6).join("wide-b.png").exists());
        assert!(!fx.dir(6).join("wide-a.png").exists());
    }

    #[tokio::test]
    async fn test_replace_removes_old_variants() {
        let fx = Fixture::new();
        fx.stored(5, &["a.png", "thumb-a.png", "wide-a.png"]).await;
        let image = fx.image(fx.thumbs(), fx.upload("b.png").await);

        let mut record = MemoryRecord::new("Post")
            .with_attribute("id", 5i64)
            .with_attribute("photo", "a.png")
            .into_persisted();
        save(&image, &mut record).await.unwrap();

        let dir = fx.dir(5);
        for gone in ["a.png", "thumb-a.png", "wide-a.png"] {
            assert!(!dir.join(gone).exists(), "{} should be removed", gone);
        }
        for present in ["b.png", "thumb-b.png", "wide-b.png"] {
            assert!(dir.join(present).exists(), "{} should exist", present);
        }
    }

    #[tokio::test]
    async fn test_delete_removes_everything() {
        let fx = Fixture::new();
        fx.stored(6, &["a.png", "thumb-a.png", "wide-a.png"]).await;
        let image = ImageAttachment::new(
            fx.config().with_delete_empty_dir(true),
            fx.thumbs(),
            fx.collaborators(MemoryUploadSource::new()),
        )
        .unwrap();

        let mut record = MemoryRecord::new("Post")
            .with_attribute("id", 6i64)
            .with_attribute("photo", "a.png")
            .into_persisted();
        record.remove().unwrap();
        image.after_delete(&mut record).await.unwrap();

        assert!(!fx.dir(6).exists());
        let path = image.base().upload_path(&record, "photo", false).unwrap().unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_separate_thumb_directory_is_pruned() {
        let fx = Fixture::new();
        fx.stored(7, &["a.png"]).await;
        let thumb_dir = fx.root.path().join("thumbs").join("7");
        fs::create_dir_all(&thumb_dir).await.unwrap();
        fs::write(thumb_dir.join("thumb-a.png"), b"t").await.unwrap();

        let thumbs = fx
            .thumbs()
            .with_thumb_path(format!("{}/thumbs/{{id}}", fx.root.path().display()));
        let image = ImageAttachment::new(
            fx.config().with_delete_empty_dir(true),
            thumbs,
            fx.collaborators(MemoryUploadSource::new()),
        )
        .unwrap();

        let mut record = MemoryRecord::new("Post")
            .with_attribute("id", 7i64)
            .with_attribute("photo", "a.png")
            .into_persisted();
        image.delete_image(&mut record, "photo").await.unwrap();

        assert!(!thumb_dir.exists());
        assert!(!fx.dir(7).exists());
        assert_eq!(record.attribute("photo"), Some(&Value::Null));
    }

    #[tokio::test]
    async fn test_delete_original_after_eager_thumbs() {
        let fx = Fixture::new();
        let thumbs = fx.thumbs().with_delete_original_file(true);
        let image = fx.image(thumbs, fx.upload("cat.png").await);

        let mut record = MemoryRecord::new("Post").with_attribute("id", 8i64);
        save(&image, &mut record).await.unwrap();

        let dir = fx.dir(8);
        assert!(!dir.join("cat.png").exists());
        assert!(dir.join("thumb-cat.png").exists());
        assert!(dir.join("wide-cat.png").exists());
    }
}
