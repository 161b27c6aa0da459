//! Attachment configuration
//!
//! Configurations are plain data and deserialize from TOML/JSON. Custom path
//! and naming functions are attached in code.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use fb_core::{RecordHost, UploadedFile, SCENARIO_INSERT, SCENARIO_UPDATE};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{AttachmentError, AttachmentResult};

/// Custom path function: receives the record, returns a directory or URL
pub type PathFn = Arc<dyn Fn(&dyn RecordHost) -> String + Send + Sync>;

/// Custom name generator: receives the upload, returns the filename
pub type NameFn = Arc<dyn Fn(&UploadedFile) -> String + Send + Sync>;

/// Directory or URL template
#[derive(Clone)]
pub enum PathTemplate {
    /// String with `{field}` placeholders and an optional leading `@alias`
    Pattern(String),
    /// Function of the record
    Custom(PathFn),
}

impl PathTemplate {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&dyn RecordHost) -> String + Send + Sync + 'static,
    {
        PathTemplate::Custom(Arc::new(f))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, PathTemplate::Pattern(p) if p.trim().is_empty())
    }
}

impl Default for PathTemplate {
    fn default() -> Self {
        PathTemplate::Pattern(String::new())
    }
}

impl fmt::Debug for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathTemplate::Pattern(p) => f.debug_tuple("Pattern").field(p).finish(),
            PathTemplate::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl From<&str> for PathTemplate {
    fn from(s: &str) -> Self {
        PathTemplate::Pattern(s.to_string())
    }
}

impl From<String> for PathTemplate {
    fn from(s: String) -> Self {
        PathTemplate::Pattern(s)
    }
}

impl<'de> Deserialize<'de> for PathTemplate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(PathTemplate::Pattern)
    }
}

/// How an incoming file is named on disk
#[derive(Clone, Default)]
pub enum NameStrategy {
    /// Keep the client's name, with unsafe characters replaced
    #[default]
    KeepSanitized,
    /// Random unique basename plus the original extension
    GenerateUnique,
    /// Caller supplied generator
    Custom(NameFn),
}

impl NameStrategy {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&UploadedFile) -> String + Send + Sync + 'static,
    {
        NameStrategy::Custom(Arc::new(f))
    }

    /// Whether a generated name replaces the client's name
    pub fn generates_names(&self) -> bool {
        !matches!(self, NameStrategy::KeepSanitized)
    }
}

impl fmt::Debug for NameStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameStrategy::KeepSanitized => f.write_str("KeepSanitized"),
            NameStrategy::GenerateUnique => f.write_str("GenerateUnique"),
            NameStrategy::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl<'de> Deserialize<'de> for NameStrategy {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Flag(bool),
            Named(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Flag(true) => Ok(NameStrategy::GenerateUnique),
            Repr::Flag(false) => Ok(NameStrategy::KeepSanitized),
            Repr::Named(name) => match name.as_str() {
                "unique" | "generate_unique" => Ok(NameStrategy::GenerateUnique),
                "keep" | "sanitize" | "keep_sanitized" => Ok(NameStrategy::KeepSanitized),
                other => Err(serde::de::Error::custom(format!(
                    "unknown name strategy {:?}",
                    other
                ))),
            },
        }
    }
}

fn yes() -> bool {
    true
}

fn default_scenarios() -> Vec<String> {
    vec![SCENARIO_INSERT.to_string(), SCENARIO_UPDATE.to_string()]
}

fn default_temp_folder() -> PathBuf {
    std::env::temp_dir().join("filebind")
}

/// Binding of one record attribute to a stored file
#[derive(Debug, Clone, Deserialize)]
pub struct AttachmentConfig {
    /// Attribute holding the filename
    #[serde(default)]
    pub attribute: String,
    /// Scenarios in which uploads are picked up
    #[serde(default = "default_scenarios")]
    pub scenarios: Vec<String>,
    /// Directory template files are stored under
    #[serde(default)]
    pub path: PathTemplate,
    /// URL template files are served from
    #[serde(default)]
    pub url: PathTemplate,
    /// Look the upload up by the bare attribute name instead of `form[attribute]`
    #[serde(default)]
    pub instance_by_name: bool,
    #[serde(default, alias = "generate_new_name")]
    pub name_strategy: NameStrategy,
    /// Delete the superseded file when the attribute changes on update
    #[serde(default = "yes")]
    pub unlink_on_save: bool,
    /// Delete the file when the record is deleted
    #[serde(default = "yes")]
    pub unlink_on_delete: bool,
    /// Move (rather than copy) the temp file into place
    #[serde(default = "yes")]
    pub delete_temp_file: bool,
    /// Remove the directory once its last file is deleted
    #[serde(default)]
    pub delete_empty_dir: bool,
    #[serde(default = "yes")]
    pub restore_value_after_failed_validation: bool,
    /// Staging folder for imports
    #[serde(default = "default_temp_folder")]
    pub temp_folder: PathBuf,
    /// `@alias` prefixes available to `path` and `url`
    #[serde(default)]
    pub aliases: HashMap<String, String>,
}

impl AttachmentConfig {
    pub fn new(
        attribute: impl Into<String>,
        path: impl Into<PathTemplate>,
        url: impl Into<PathTemplate>,
    ) -> Self {
        Self {
            attribute: attribute.into(),
            scenarios: default_scenarios(),
            path: path.into(),
            url: url.into(),
            instance_by_name: false,
            name_strategy: NameStrategy::KeepSanitized,
            unlink_on_save: true,
            unlink_on_delete: true,
            delete_temp_file: true,
            delete_empty_dir: false,
            restore_value_after_failed_validation: true,
            temp_folder: default_temp_folder(),
            aliases: HashMap::new(),
        }
    }

    pub fn with_scenarios(mut self, scenarios: &[&str]) -> Self {
        self.scenarios = scenarios.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_name_strategy(mut self, strategy: NameStrategy) -> Self {
        self.name_strategy = strategy;
        self
    }

    pub fn with_unique_names(self) -> Self {
        self.with_name_strategy(NameStrategy::GenerateUnique)
    }

    pub fn with_instance_by_name(mut self, enabled: bool) -> Self {
        self.instance_by_name = enabled;
        self
    }

    pub fn with_unlink_on_save(mut self, enabled: bool) -> Self {
        self.unlink_on_save = enabled;
        self
    }

    pub fn with_unlink_on_delete(mut self, enabled: bool) -> Self {
        self.unlink_on_delete = enabled;
        self
    }

    pub fn with_delete_temp_file(mut self, enabled: bool) -> Self {
        self.delete_temp_file = enabled;
        self
    }

    pub fn with_delete_empty_dir(mut self, enabled: bool) -> Self {
        self.delete_empty_dir = enabled;
        self
    }

    pub fn with_restore_value_after_failed_validation(mut self, enabled: bool) -> Self {
        self.restore_value_after_failed_validation = enabled;
        self
    }

    pub fn with_temp_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.temp_folder = folder.into();
        self
    }

    pub fn with_alias(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.aliases.insert(name.into(), value.into());
        self
    }

    pub fn with_aliases(mut self, aliases: HashMap<String, String>) -> Self {
        self.aliases.extend(aliases);
        self
    }

    /// Check the required settings
    pub fn validate(&self) -> AttachmentResult<()> {
        if self.attribute.trim().is_empty() {
            return Err(AttachmentError::config("The 'attribute' property must be set"));
        }
        if self.path.is_empty() {
            return Err(AttachmentError::config("The 'path' property must be set"));
        }
        if self.url.is_empty() {
            return Err(AttachmentError::config("The 'url' property must be set"));
        }
        Ok(())
    }
}

/// How the source is fitted into a thumbnail box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitMode {
    /// Scale to fit inside the box, pad the rest with the background colour
    #[default]
    Inset,
    /// Scale to cover the box and crop the overflow
    Outbound,
}

/// RGBA colour parsed from `FFF`, `FFFFFF` or `FFFFFF80` (optional `#`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color {
        r: 255,
        g: 255,
        b: 255,
        a: 255,
    };

    pub fn to_rgba(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::WHITE
    }
}

impl FromStr for Color {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        let channel = |i: usize, len: usize| {
            u8::from_str_radix(&hex[i..i + len], 16)
                .map(|v| if len == 1 { v * 17 } else { v })
                .map_err(|_| format!("invalid colour {:?}", s))
        };

        if !hex.is_ascii() {
            return Err(format!("invalid colour {:?}", s));
        }

        match hex.len() {
            3 => Ok(Color {
                r: channel(0, 1)?,
                g: channel(1, 1)?,
                b: channel(2, 1)?,
                a: 255,
            }),
            6 => Ok(Color {
                r: channel(0, 2)?,
                g: channel(2, 2)?,
                b: channel(4, 2)?,
                a: 255,
            }),
            8 => Ok(Color {
                r: channel(0, 2)?,
                g: channel(2, 2)?,
                b: channel(4, 2)?,
                a: channel(6, 2)?,
            }),
            _ => Err(format!("invalid colour {:?}", s)),
        }
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// A named thumbnail configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ThumbProfile {
    #[serde(default)]
    pub width: Option<i64>,
    #[serde(default)]
    pub height: Option<i64>,
    /// Encoder quality, 1-100
    #[serde(default)]
    pub quality: Option<u8>,
    #[serde(default)]
    pub mode: FitMode,
    #[serde(default)]
    pub bg_color: Color,
}

impl ThumbProfile {
    /// Box of exactly `width` x `height`
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: Some(width.into()),
            height: Some(height.into()),
            quality: None,
            mode: FitMode::Inset,
            bg_color: Color::WHITE,
        }
    }

    /// Fixed width, height follows the source's aspect ratio
    pub fn fit_width(width: u32) -> Self {
        Self {
            height: None,
            ..Self::new(width, 0)
        }
    }

    /// Fixed height, width follows the source's aspect ratio
    pub fn fit_height(height: u32) -> Self {
        Self {
            width: None,
            ..Self::new(0, height)
        }
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn with_mode(mut self, mode: FitMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_bg_color(mut self, color: Color) -> Self {
        self.bg_color = color;
        self
    }

    /// Configured width, if positive
    pub fn target_width(&self) -> Option<u32> {
        self.width.filter(|w| *w > 0).and_then(|w| u32::try_from(w).ok())
    }

    /// Configured height, if positive
    pub fn target_height(&self) -> Option<u32> {
        self.height.filter(|h| *h > 0).and_then(|h| u32::try_from(h).ok())
    }

    /// Quality, defaulting to 100
    pub fn quality(&self) -> u8 {
        self.quality.unwrap_or(100).clamp(1, 100)
    }

    fn validate(&self, name: &str) -> AttachmentResult<()> {
        if self.target_width().is_none() && self.target_height().is_none() {
            return Err(AttachmentError::config(format!(
                "Length of either side of thumb '{}' cannot be 0 or negative, current size is {}x{}",
                name,
                self.width.unwrap_or(0),
                self.height.unwrap_or(0)
            )));
        }
        Ok(())
    }
}

/// Fallback image used when the attribute holds no file
#[derive(Debug, Clone, Deserialize)]
pub struct Placeholder {
    /// Placeholder image on disk; its thumbnails are written beside it
    pub path: PathBuf,
    /// Public URL of the placeholder image
    pub url: String,
}

fn default_thumbs() -> IndexMap<String, ThumbProfile> {
    let mut thumbs = IndexMap::new();
    thumbs.insert("thumb".to_string(), ThumbProfile::new(200, 200).with_quality(90));
    thumbs
}

/// Image specific settings layered on top of [`AttachmentConfig`]
#[derive(Debug, Clone, Deserialize)]
pub struct ThumbConfig {
    #[serde(default)]
    pub placeholder: Option<Placeholder>,
    #[serde(default = "yes")]
    pub create_thumbs_on_save: bool,
    #[serde(default)]
    pub create_thumbs_on_request: bool,
    /// Remove the original once the eager thumbnails exist
    #[serde(default)]
    pub delete_original_file: bool,
    #[serde(default = "default_thumbs")]
    pub thumbs: IndexMap<String, ThumbProfile>,
    /// Defaults to the attachment's `path`
    #[serde(default)]
    pub thumb_path: Option<PathTemplate>,
    /// Defaults to the attachment's `url`
    #[serde(default)]
    pub thumb_url: Option<PathTemplate>,
}

impl Default for ThumbConfig {
    fn default() -> Self {
        Self {
            placeholder: None,
            create_thumbs_on_save: true,
            create_thumbs_on_request: false,
            delete_original_file: false,
            thumbs: default_thumbs(),
            thumb_path: None,
            thumb_url: None,
        }
    }
}

impl ThumbConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the profile set
    pub fn with_profiles<I, S>(mut self, profiles: I) -> Self
    where
        I: IntoIterator<Item = (S, ThumbProfile)>,
        S: Into<String>,
    {
        self.thumbs = profiles.into_iter().map(|(n, p)| (n.into(), p)).collect();
        self
    }

    pub fn with_profile(mut self, name: impl Into<String>, profile: ThumbProfile) -> Self {
        self.thumbs.insert(name.into(), profile);
        self
    }

    pub fn with_placeholder(mut self, path: impl Into<PathBuf>, url: impl Into<String>) -> Self {
        self.placeholder = Some(Placeholder {
            path: path.into(),
            url: url.into(),
        });
        self
    }

    pub fn with_thumb_path(mut self, path: impl Into<PathTemplate>) -> Self {
        self.thumb_path = Some(path.into());
        self
    }

    pub fn with_thumb_url(mut self, url: impl Into<PathTemplate>) -> Self {
        self.thumb_url = Some(url.into());
        self
    }

    pub fn with_create_thumbs_on_save(mut self, enabled: bool) -> Self {
        self.create_thumbs_on_save = enabled;
        self
    }

    pub fn with_create_thumbs_on_request(mut self, enabled: bool) -> Self {
        self.create_thumbs_on_request = enabled;
        self
    }

    pub fn with_delete_original_file(mut self, enabled: bool) -> Self {
        self.delete_original_file = enabled;
        self
    }

    pub fn profile(&self, name: &str) -> AttachmentResult<&ThumbProfile> {
        self.thumbs
            .get(name)
            .ok_or_else(|| AttachmentError::config(format!("Unknown thumbnail profile '{}'", name)))
    }

    pub fn validate(&self) -> AttachmentResult<()> {
        for (name, profile) in &self.thumbs {
            profile.validate(name)?;
        }
        Ok(())
    }
}
