//! Thumbnail derivation

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::backend::{Dimensions, ImageBackend, ThumbRequest};
use crate::config::ThumbProfile;
use crate::error::{AttachmentError, AttachmentResult};
use crate::janitor;

/// Filename of a profile's variant of `file_name`
pub fn thumb_file_name(profile: &str, file_name: &str) -> String {
    format!("{}-{}", profile, file_name)
}

/// Target box of a profile.
///
/// A missing side follows the source's aspect ratio, rounded up.
pub fn thumb_size(
    width: Option<u32>,
    height: Option<u32>,
    source: Option<Dimensions>,
) -> AttachmentResult<(u32, u32)> {
    let ratio_source = || {
        source
            .filter(|d| d.width > 0 && d.height > 0)
            .ok_or_else(|| AttachmentError::Image("source image has no usable size".to_string()))
    };

    match (width, height) {
        (Some(w), Some(h)) => Ok((w, h)),
        (Some(w), None) => {
            let src = ratio_source()?;
            Ok((w, ceil_scale(w, src.height, src.width)))
        }
        (None, Some(h)) => {
            let src = ratio_source()?;
            Ok((ceil_scale(h, src.width, src.height), h))
        }
        (None, None) => Err(AttachmentError::config(
            "Length of either side of thumb cannot be 0 or negative",
        )),
    }
}

/// `ceil(value * num / den)` without floating point
fn ceil_scale(value: u32, num: u32, den: u32) -> u32 {
    let (value, num, den) = (u64::from(value), u64::from(num), u64::from(den));
    let scaled = (value * num).div_ceil(den);
    u32::try_from(scaled).unwrap_or(u32::MAX)
}

/// Produces thumbnail variants through an [`ImageBackend`]
#[derive(Clone)]
pub struct ThumbnailEngine {
    backend: Arc<dyn ImageBackend>,
}

impl ThumbnailEngine {
    pub fn new(backend: Arc<dyn ImageBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &dyn ImageBackend {
        self.backend.as_ref()
    }

    /// Render `target` from `original` unless it already exists.
    ///
    /// Returns whether the backend was invoked.
    #[instrument(skip(self, profile), fields(backend = self.backend.name()))]
    pub async fn ensure(
        &self,
        original: &Path,
        target: &Path,
        profile: &ThumbProfile,
    ) -> AttachmentResult<bool> {
        if let Some(dir) = target.parent() {
            janitor::ensure_dir(dir).await?;
        }
        if janitor::is_file(target).await {
            debug!("Thumbnail exists");
            return Ok(false);
        }

        let (width, height) = (profile.target_width(), profile.target_height());
        let source = match (width, height) {
            (Some(_), Some(_)) => None,
            _ => Some(self.backend.dimensions(original).await?),
        };
        let (width, height) = thumb_size(width, height, source)?;

        let request = ThumbRequest {
            width,
            height,
            mode: profile.mode,
            background: profile.bg_color,
            quality: profile.quality(),
        };
        self.backend.thumbnail(original, target, &request).await?;
        info!(width, height, "Thumbnail created");
        Ok(true)
    }
}

impl std::fmt::Debug for ThumbnailEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThumbnailEngine")
            .field("backend", &self.backend.name())
            .finish()
    }
}
