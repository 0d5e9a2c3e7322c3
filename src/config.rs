//! Configuration module for filedepot.

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::{DepotError, Result};

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/filedepot.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Physical storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Root directory for uploaded files.
    #[serde(default = "default_upload_root")]
    pub upload_root: String,
    /// Root directory for generated thumbnails and frames.
    #[serde(default = "default_thumbnail_root")]
    pub thumbnail_root: String,
    /// Maximum upload size in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Allowed MIME types. Entries may end in "/*" to match a whole
    /// top-level type, e.g. "image/*".
    #[serde(default = "default_allowed_mime_types")]
    pub allowed_mime_types: Vec<String>,
    /// Whether to generate thumbnails for uploaded images.
    #[serde(default = "default_enable_thumbnails")]
    pub enable_thumbnails: bool,
}

fn default_upload_root() -> String {
    "data/uploads".to_string()
}

fn default_thumbnail_root() -> String {
    "data/thumbnails".to_string()
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024
}

fn default_allowed_mime_types() -> Vec<String> {
    vec![
        "image/*".to_string(),
        "video/*".to_string(),
        "application/pdf".to_string(),
        "text/plain".to_string(),
    ]
}

fn default_enable_thumbnails() -> bool {
    true
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_root: default_upload_root(),
            thumbnail_root: default_thumbnail_root(),
            max_file_size: default_max_file_size(),
            allowed_mime_types: default_allowed_mime_types(),
            enable_thumbnails: default_enable_thumbnails(),
        }
    }
}

/// Media preview pipeline configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaConfig {
    /// Timeout in seconds for external frame extraction.
    #[serde(default = "default_frame_timeout")]
    pub frame_timeout_secs: u64,
    /// Timeout in seconds for fallback thumbnail downloads.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
    /// Maximum thumbnail width in pixels.
    #[serde(default = "default_thumbnail_width")]
    pub thumbnail_max_width: u32,
    /// Maximum thumbnail height in pixels.
    #[serde(default = "default_thumbnail_height")]
    pub thumbnail_max_height: u32,
}

fn default_frame_timeout() -> u64 {
    30
}

fn default_fetch_timeout() -> u64 {
    20
}

fn default_thumbnail_width() -> u32 {
    320
}

fn default_thumbnail_height() -> u32 {
    240
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            frame_timeout_secs: default_frame_timeout(),
            fetch_timeout_secs: default_fetch_timeout(),
            thumbnail_max_width: default_thumbnail_width(),
            thumbnail_max_height: default_thumbnail_height(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace / debug / info / warn / error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/filedepot.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Top-level configuration for filedepot.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Media pipeline settings.
    #[serde(default)]
    pub media: MediaConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// Missing fields fall back to their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| DepotError::Config(format!("cannot read {}: {e}", path.display())))?;
        toml::from_str(&content)
            .map_err(|e| DepotError::Config(format!("cannot parse {}: {e}", path.display())))
    }

    /// Load configuration from a file if it exists, otherwise use defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path).unwrap_or_default()
        } else {
            Self::default()
        }
    }

    /// Create the storage roots if they do not exist.
    ///
    /// Inaccessible roots at startup are a configuration error.
    pub fn ensure_storage_roots(&self) -> Result<()> {
        for root in [&self.storage.upload_root, &self.storage.thumbnail_root] {
            fs::create_dir_all(root).map_err(|e| {
                DepotError::Config(format!("cannot create storage root {root}: {e}"))
            })?;
        }
        Ok(())
    }
}
