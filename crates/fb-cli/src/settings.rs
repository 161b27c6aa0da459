//! Attachment definitions
//!
//! Definitions come from an optional TOML file, overridden by `FILEBIND__`
//! variables (`FILEBIND__ATTACHMENTS__LOGO__PATH=...`).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use fb_attachments::{
    AttachmentConfig, AttachmentSet, Collaborators, FileAttachment, ImageAttachment,
    ImageCrateBackend, ReqwestFetcher, ThumbConfig,
};
use fb_core::config::AppConfig;
use fb_core::{MemoryUploadSource, Value};
use indexmap::IndexMap;
use serde::Deserialize;
use tracing::debug;

/// Everything declared in a definitions file
#[derive(Debug, Default, Deserialize)]
pub struct Definitions {
    /// Attachments keyed by attribute
    #[serde(default)]
    pub attachments: IndexMap<String, AttachmentDefinition>,
}

#[derive(Debug, Deserialize)]
pub struct AttachmentDefinition {
    /// Staging folder; the application's when unset
    #[serde(default)]
    pub temp_folder: Option<PathBuf>,
    #[serde(flatten)]
    pub base: AttachmentConfig,
    /// Thumbnail settings, which make this an image attachment
    #[serde(default)]
    pub image: Option<ThumbConfig>,
}

/// Read definitions from `path` (if any) and the environment
pub fn load_definitions(path: Option<&Path>) -> anyhow::Result<Definitions> {
    let mut builder = Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(File::from(path));
    }
    let builder = builder.add_source(
        Environment::with_prefix("FILEBIND")
            .prefix_separator("__")
            .separator("__"),
    );
    deserialize(builder)
}

fn deserialize(builder: ConfigBuilder<DefaultState>) -> anyhow::Result<Definitions> {
    builder
        .build()
        .context("Failed to read attachment definitions")?
        .try_deserialize()
        .context("Invalid attachment definitions")
}

/// Production collaborators: no form uploads, `reqwest` and the `image` crate
pub fn collaborators(app: &AppConfig) -> anyhow::Result<Collaborators> {
    let fetcher = ReqwestFetcher::new(
        Duration::from_secs(app.http.timeout_seconds),
        &app.http.user_agent,
    )?;
    Ok(Collaborators::new(Arc::new(MemoryUploadSource::new()))
        .with_fetcher(Arc::new(fetcher))
        .with_image_backend(Arc::new(ImageCrateBackend::new())))
}

/// Build the attachment set.
///
/// The attribute defaults to the definition's key. Definition aliases win
/// over the application's `@uploads` / `@web` and configured ones.
pub fn build_set(
    definitions: Definitions,
    app: &AppConfig,
    collaborators: &Collaborators,
) -> anyhow::Result<AttachmentSet> {
    let mut set = AttachmentSet::new();
    for (key, definition) in definitions.attachments {
        let mut config = definition.base;
        if config.attribute.is_empty() {
            config.attribute = key.clone();
        }
        let mut aliases = app.path_aliases();
        aliases.extend(std::mem::take(&mut config.aliases));
        config.aliases = aliases;
        config.temp_folder = definition
            .temp_folder
            .unwrap_or_else(|| app.storage.temp_folder.clone());

        match definition.image {
            Some(thumbs) => {
                let attachment = ImageAttachment::new(config, thumbs, collaborators.clone())
                    .with_context(|| format!("Attachment '{}'", key))?;
                set.insert(Arc::new(attachment));
            }
            None => {
                let attachment = FileAttachment::new(config, collaborators.clone())
                    .with_context(|| format!("Attachment '{}'", key))?;
                set.insert(Arc::new(attachment));
            }
        }
        debug!(attachment = %key, "Attachment registered");
    }
    Ok(set)
}

/// Parse `name=value` into a record attribute.
///
/// Integers and floats keep their type, anything else is a string.
pub fn parse_field(raw: &str) -> Result<(String, Value), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got {:?}", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing attribute name in {:?}", raw));
    }

    let value = if let Ok(i) = value.parse::<i64>() {
        Value::from(i)
    } else if let Ok(f) = value.parse::<f64>() {
        Value::from(f)
    } else {
        Value::from(value)
    };
    Ok((name.to_string(), value))
}
