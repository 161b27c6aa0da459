//! Configuration types and loading

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Where files live and how they are addressed
    pub storage: StorageConfig,

    /// Remote import settings
    pub http: HttpConfig,

    /// Log output settings
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Root directory uploads are stored under (`@uploads` alias)
    pub upload_root: PathBuf,
    /// Public URL prefix for the upload root (`@web` alias)
    pub base_url: String,
    /// Staging folder for imported files
    pub temp_folder: PathBuf,
    /// Extra path aliases, e.g. `@webroot` -> `/var/www`
    #[serde(default)]
    pub aliases: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    pub timeout_seconds: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human readable output
    pub json: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig {
                upload_root: PathBuf::from("./uploads"),
                base_url: "/uploads".to_string(),
                temp_folder: std::env::temp_dir().join("filebind"),
                aliases: HashMap::new(),
            },
            http: HttpConfig {
                timeout_seconds: 30,
                user_agent: format!("filebind/{}", env!("CARGO_PKG_VERSION")),
            },
            logging: LoggingConfig::default(),
        }
    }
}

/// A `FILEBIND_*` variable that could not be used
#[derive(Debug, thiserror::Error)]
#[error("{variable} is invalid: {message}")]
pub struct ConfigError {
    pub variable: String,
    pub message: String,
}

impl ConfigError {
    fn invalid(variable: &str, message: String) -> Self {
        Self {
            variable: variable.to_string(),
            message,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        // Storage
        if let Ok(root) = std::env::var("FILEBIND_UPLOAD_ROOT") {
            config.storage.upload_root = PathBuf::from(root);
        }
        if let Ok(url) = std::env::var("FILEBIND_BASE_URL") {
            config.storage.base_url = url;
        }
        if let Ok(temp) = std::env::var("FILEBIND_TEMP_FOLDER") {
            config.storage.temp_folder = PathBuf::from(temp);
        }
        if let Ok(aliases) = std::env::var("FILEBIND_ALIASES") {
            config.storage.aliases = Self::parse_aliases(&aliases)?;
        }

        // HTTP
        if let Ok(timeout) = std::env::var("FILEBIND_HTTP_TIMEOUT") {
            config.http.timeout_seconds = timeout.parse().map_err(|_| {
                ConfigError::invalid(
                    "FILEBIND_HTTP_TIMEOUT",
                    format!("expected seconds, got {:?}", timeout),
                )
            })?;
        }
        if let Ok(agent) = std::env::var("FILEBIND_USER_AGENT") {
            config.http.user_agent = agent;
        }

        // Logging
        if let Ok(v) = std::env::var("FILEBIND_LOG_JSON") {
            config.logging.json = v == "true" || v == "1" || v == "yes";
        }

        Ok(config)
    }

    /// Parse `@name=value` pairs separated by commas
    pub fn parse_aliases(raw: &str) -> Result<HashMap<String, String>, ConfigError> {
        let mut aliases = HashMap::new();
        for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, value) = pair.split_once('=').ok_or_else(|| {
                ConfigError::invalid(
                    "FILEBIND_ALIASES",
                    format!("expected @name=value, got {:?}", pair),
                )
            })?;
            if !name.starts_with('@') {
                return Err(ConfigError::invalid(
                    "FILEBIND_ALIASES",
                    format!("alias {:?} must start with @", name),
                ));
            }
            aliases.insert(name.to_string(), value.to_string());
        }
        Ok(aliases)
    }

    /// Aliases every attachment path can use: the configured ones plus
    /// `@uploads` and `@web`
    pub fn path_aliases(&self) -> HashMap<String, String> {
        let mut aliases = self.storage.aliases.clone();
        aliases
            .entry("@uploads".to_string())
            .or_insert_with(|| self.storage.upload_root.to_string_lossy().into_owned());
        aliases
            .entry("@web".to_string())
            .or_insert_with(|| self.storage.base_url.clone());
        aliases
    }
}
