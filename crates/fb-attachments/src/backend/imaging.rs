//! Image backends

use std::collections::HashMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use super::{Dimensions, ImageBackend, ThumbRequest};
use crate::config::FitMode;
use crate::error::{AttachmentError, AttachmentResult};
use crate::janitor;

/// Backend built on the `image` crate. Pixel work runs on the blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCrateBackend;

impl ImageCrateBackend {
    pub fn new() -> Self {
        Self
    }
}

fn image_error(path: &Path, e: image::ImageError) -> AttachmentError {
    match e {
        image::ImageError::IoError(source) => AttachmentError::io(path, source),
        other => AttachmentError::Image(format!("{}: {}", path.display(), other)),
    }
}

fn join_error(e: tokio::task::JoinError) -> AttachmentError {
    AttachmentError::Image(format!("image task failed: {}", e))
}

/// Fit inside the box without upscaling, then centre on a filled canvas
fn inset(img: &DynamicImage, request: &ThumbRequest) -> DynamicImage {
    let fitted = if img.width() <= request.width && img.height() <= request.height {
        img.clone()
    } else {
        img.resize(request.width, request.height, FilterType::Lanczos3)
    };

    let mut canvas = RgbaImage::from_pixel(
        request.width,
        request.height,
        Rgba(request.background.to_rgba()),
    );
    let x = (request.width - fitted.width()) / 2;
    let y = (request.height - fitted.height()) / 2;
    imageops::overlay(&mut canvas, &fitted.to_rgba8(), i64::from(x), i64::from(y));
    DynamicImage::ImageRgba8(canvas)
}

fn render(source: &Path, target: &Path, request: &ThumbRequest) -> AttachmentResult<()> {
    let img = image::open(source).map_err(|e| image_error(source, e))?;

    let thumb = match request.mode {
        FitMode::Inset => inset(&img, request),
        FitMode::Outbound => {
            img.resize_to_fill(request.width, request.height, FilterType::Lanczos3)
        }
    };

    let format = ImageFormat::from_path(target).map_err(|e| image_error(target, e))?;
    match format {
        ImageFormat::Jpeg => {
            let file = File::create(target).map_err(|e| AttachmentError::io(target, e))?;
            let mut writer = BufWriter::new(file);
            let encoder = JpegEncoder::new_with_quality(&mut writer, request.quality);
            DynamicImage::ImageRgb8(thumb.to_rgb8())
                .write_with_encoder(encoder)
                .map_err(|e| image_error(target, e))?;
        }
        other => thumb
            .save_with_format(target, other)
            .map_err(|e| image_error(target, e))?,
    }
    Ok(())
}

#[async_trait]
impl ImageBackend for ImageCrateBackend {
    async fn dimensions(&self, path: &Path) -> AttachmentResult<Dimensions> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || {
            let (width, height) =
                image::image_dimensions(&path).map_err(|e| image_error(&path, e))?;
            Ok(Dimensions { width, height })
        })
        .await
        .map_err(join_error)?
    }

    #[instrument(
        skip(self, request),
        fields(backend = "image", width = request.width, height = request.height)
    )]
    async fn thumbnail(
        &self,
        source: &Path,
        target: &Path,
        request: &ThumbRequest,
    ) -> AttachmentResult<()> {
        let (source, target, job) = (source.to_path_buf(), target.to_path_buf(), request.clone());
        tokio::task::spawn_blocking(move || render(&source, &target, &job))
            .await
            .map_err(join_error)??;
        debug!("Thumbnail rendered");
        Ok(())
    }

    fn name(&self) -> &str {
        "image"
    }
}

/// A recorded [`ImageBackend::thumbnail`] call
#[derive(Debug, Clone, PartialEq)]
pub struct ThumbCall {
    pub source: PathBuf,
    pub target: PathBuf,
    pub request: ThumbRequest,
}

/// In-memory backend that records calls and writes marker files (for testing)
#[derive(Debug, Default)]
pub struct MemoryImageBackend {
    default_size: Option<Dimensions>,
    sizes: HashMap<PathBuf, Dimensions>,
    calls: RwLock<Vec<ThumbCall>>,
}

impl MemoryImageBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Size reported for every image without an explicit size
    pub fn with_default_size(mut self, width: u32, height: u32) -> Self {
        self.default_size = Some(Dimensions { width, height });
        self
    }

    pub fn with_size(mut self, path: impl Into<PathBuf>, width: u32, height: u32) -> Self {
        self.sizes.insert(path.into(), Dimensions { width, height });
        self
    }

    pub async fn calls(&self) -> Vec<ThumbCall> {
        self.calls.read().await.clone()
    }
}

#[async_trait]
impl ImageBackend for MemoryImageBackend {
    async fn dimensions(&self, path: &Path) -> AttachmentResult<Dimensions> {
        if !janitor::is_file(path).await {
            return Err(AttachmentError::NotFound(path.to_path_buf()));
        }
        self.sizes
            .get(path)
            .copied()
            .or(self.default_size)
            .ok_or_else(|| AttachmentError::Image(format!("{}: unknown size", path.display())))
    }

    async fn thumbnail(
        &self,
        source: &Path,
        target: &Path,
        request: &ThumbRequest,
    ) -> AttachmentResult<()> {
        if !janitor::is_file(source).await {
            return Err(AttachmentError::NotFound(source.to_path_buf()));
        }
        tokio::fs::write(target, format!("{}x{}", request.width, request.height))
            .await
            .map_err(|e| AttachmentError::io(target, e))?;
        self.calls.write().await.push(ThumbCall {
            source: source.to_path_buf(),
            target: target.to_path_buf(),
            request: request.clone(),
        });
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
