//! filebind command line
//!
//! Imports files into record attributes, resolves thumbnail URLs and
//! deletes stored files, using attachments declared in a TOML file.

use std::path::PathBuf;

use anyhow::{anyhow, bail};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fb_attachments::{Attachable, AttachmentSet, SetOperation};
use fb_core::config::AppConfig;
use fb_core::{MemoryRecord, RecordHost, Value};

mod settings;

#[derive(Parser)]
#[command(name = "filebind")]
#[command(about = "Bind record attributes to stored files", version)]
struct Cli {
    /// Attachment definitions (TOML)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,
    /// Form name of the record
    #[arg(long, default_value = "Record", global = true)]
    form: String,
    /// Record attribute as name=value, used by path templates
    #[arg(long = "field", value_parser = settings::parse_field, global = true)]
    fields: Vec<(String, Value)>,
    /// Scenario the record is in
    #[arg(long, global = true)]
    scenario: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download a URL into an attribute
    ImportUrl { attribute: String, url: String },
    /// Copy a local file into an attribute
    ImportFile { attribute: String, path: PathBuf },
    /// Print the public URL of a stored file
    Url {
        attribute: String,
        #[arg(long)]
        filename: String,
    },
    /// Print the URL of a thumbnail, or of the placeholder's
    ThumbUrl {
        attribute: String,
        profile: String,
        /// Stored filename; omit to use the placeholder
        #[arg(long)]
        filename: Option<String>,
    },
    /// Render missing thumbnails of a stored image
    Thumbs {
        attribute: String,
        #[arg(long)]
        filename: String,
        /// Only this profile
        #[arg(long)]
        profile: Option<String>,
    },
    /// Delete a stored file and its thumbnails
    Delete {
        attribute: String,
        #[arg(long)]
        filename: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();
    let (app, config_error) = match AppConfig::from_env() {
        Ok(config) => (config, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };
    init_tracing(app.logging.json);
    if let Some(e) = config_error {
        warn!("Failed to load config from env: {}, using defaults", e);
    }

    let definitions = settings::load_definitions(cli.config.as_deref())?;
    let collaborators = settings::collaborators(&app)?;
    let set = settings::build_set(definitions, &app, &collaborators)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        attachments = set.len(),
        "filebind ready"
    );

    run(&cli, &set).await
}

/// Initialize tracing/logging on stderr
fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "warn,fb_attachments=info,fb_cli=info".into());
    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_writer(std::io::stderr)
    });
    let text_layer = (!json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .init();
}

async fn run(cli: &Cli, set: &AttachmentSet) -> anyhow::Result<()> {
    match &cli.command {
        Commands::ImportUrl { attribute, url } => {
            let mut record = new_record(cli);
            let mut ops = set.begin();
            let staged = set
                .upload_from_url(&mut record, &mut ops, attribute, url)
                .await?;
            commit(set, &mut record, &mut ops, attribute, staged).await
        }
        Commands::ImportFile { attribute, path } => {
            let mut record = new_record(cli);
            let mut ops = set.begin();
            let staged = set
                .upload_from_file(&mut record, &mut ops, attribute, path)
                .await?;
            commit(set, &mut record, &mut ops, attribute, staged).await
        }
        Commands::Url {
            attribute,
            filename,
        } => {
            let record = stored_record(cli, attribute, Some(filename.as_str()));
            let url = member(set, attribute)?
                .base()
                .upload_url(&record, attribute, true)?;
            match url {
                Some(url) => println!("{}", url),
                None => bail!("'{}' holds no file", attribute),
            }
            Ok(())
        }
        Commands::ThumbUrl {
            attribute,
            profile,
            filename,
        } => {
            let record = stored_record(cli, attribute, filename.as_deref());
            let image = image(set, attribute)?;
            match image.thumb_upload_url(&record, attribute, profile).await? {
                Some(url) => println!("{}", url),
                None => bail!("'{}' has no image and no placeholder", attribute),
            }
            Ok(())
        }
        Commands::Thumbs {
            attribute,
            filename,
            profile,
        } => {
            let record = stored_record(cli, attribute, Some(filename.as_str()));
            let created = image(set, attribute)?
                .create_thumbs(&record, profile.as_deref())
                .await?;
            println!("{} thumbnail(s) created", created);
            Ok(())
        }
        Commands::Delete {
            attribute,
            filename,
        } => {
            let mut record = stored_record(cli, attribute, Some(filename.as_str()));
            let attachment = member(set, attribute)?;
            match attachment.as_image() {
                Some(image) => image.delete_image(&mut record, attribute).await?,
                None => attachment.base().delete_file(&record, attribute, true).await?,
            }
            println!("deleted {}", filename);
            Ok(())
        }
    }
}

async fn commit(
    set: &AttachmentSet,
    record: &mut MemoryRecord,
    ops: &mut SetOperation,
    attribute: &str,
    staged: bool,
) -> anyhow::Result<()> {
    if !staged || !set.save(record, ops).await? {
        bail!(
            "'{}' rejected: {}",
            attribute,
            record.errors().full_messages().join("; ")
        );
    }

    let stored = record
        .attribute(attribute)
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("'{}' holds no file after save", attribute))?;
    println!("{}", stored);
    if let Some(path) = member(set, attribute)?
        .base()
        .upload_path(&*record, attribute, false)?
    {
        info!(path = %path.display(), "Stored");
    }
    Ok(())
}

fn member<'a>(set: &'a AttachmentSet, attribute: &str) -> anyhow::Result<&'a dyn Attachable> {
    set.get(attribute)
        .map(|a| a.as_ref())
        .ok_or_else(|| anyhow!("no attachment bound to '{}'", attribute))
}

fn image<'a>(
    set: &'a AttachmentSet,
    attribute: &str,
) -> anyhow::Result<&'a fb_attachments::ImageAttachment> {
    set.image(attribute)
        .ok_or_else(|| anyhow!("'{}' is not an image attachment", attribute))
}

fn new_record(cli: &Cli) -> MemoryRecord {
    let mut record = cli
        .fields
        .iter()
        .fold(MemoryRecord::new(&cli.form), |record, (name, value)| {
            record.with_attribute(name.clone(), value.clone())
        });
    if let Some(scenario) = &cli.scenario {
        record.set_scenario(scenario.clone());
    }
    record
}

/// A persisted record whose `attribute` holds `filename`
fn stored_record(cli: &Cli, attribute: &str, filename: Option<&str>) -> MemoryRecord {
    let mut record = new_record(cli);
    if let Some(filename) = filename {
        record = record.with_attribute(attribute, filename);
    }
    let mut record = record.into_persisted();
    if let Some(scenario) = &cli.scenario {
        record.set_scenario(scenario.clone());
    }
    record
}
