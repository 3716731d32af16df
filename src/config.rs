//! Configuration module for Sharebox.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::{Result, ShareboxError};

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origins.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Secret shared with the identity provider for session tokens.
    #[serde(default)]
    pub jwt_secret: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![],
            jwt_secret: String::new(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/sharebox.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// File storage and delivery configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FilesConfig {
    /// Root directory of the content store.
    #[serde(default = "default_storage_path")]
    pub storage_path: String,
    /// Sub-directory of the store root holding avatars.
    #[serde(default = "default_avatar_dir")]
    pub avatar_dir: String,
    /// Scratch directory for archives being built (system temp dir if unset).
    #[serde(default)]
    pub temp_path: Option<String>,
    /// Maximum size of a single uploaded file in megabytes.
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size_mb: u64,
    /// Storage quota per user in megabytes.
    #[serde(default = "default_storage_limit")]
    pub storage_limit_mb: u64,
    /// How long previews may be cached by the client, in seconds.
    #[serde(default = "default_preview_cache")]
    pub preview_cache_secs: u64,
    /// Read size used when streaming file content.
    #[serde(default = "default_stream_chunk_size")]
    pub stream_chunk_size: usize,
}

fn default_storage_path() -> String {
    "data/files".to_string()
}

fn default_avatar_dir() -> String {
    "avatars".to_string()
}

fn default_max_upload_size() -> u64 {
    100
}

fn default_storage_limit() -> u64 {
    5 * 1024 // 5 GB
}

fn default_preview_cache() -> u64 {
    3600
}

fn default_stream_chunk_size() -> usize {
    64 * 1024
}

impl FilesConfig {
    /// Maximum upload size in bytes.
    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_size_mb * 1024 * 1024
    }

    /// Per-user storage quota in bytes.
    pub fn storage_limit_bytes(&self) -> u64 {
        self.storage_limit_mb * 1024 * 1024
    }

    /// Directory used for transient archive files.
    pub fn temp_dir(&self) -> PathBuf {
        self.temp_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir)
    }
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            storage_path: default_storage_path(),
            avatar_dir: default_avatar_dir(),
            temp_path: None,
            max_upload_size_mb: default_max_upload_size(),
            storage_limit_mb: default_storage_limit(),
            preview_cache_secs: default_preview_cache(),
            stream_chunk_size: default_stream_chunk_size(),
        }
    }
}

/// Access policy configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessConfig {
    /// Whether owners skip the password gate on their own files and folders.
    #[serde(default)]
    pub owner_bypasses_password: bool,
    /// Password attempts allowed per principal per minute.
    #[serde(default = "default_unlock_attempts")]
    pub unlock_attempts_per_minute: u32,
}

fn default_unlock_attempts() -> u32 {
    10
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            owner_bypasses_password: false,
            unlock_attempts_per_minute: default_unlock_attempts(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Optional path to a log file, in addition to stdout.
    #[serde(default = "default_log_file")]
    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> Option<String> {
    Some("logs/sharebox.log".to_string())
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// File storage configuration.
    #[serde(default)]
    pub files: FilesConfig,
    /// Access policy configuration.
    #[serde(default)]
    pub access: AccessConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ShareboxError::Storage)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| ShareboxError::Config(format!("parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `SHAREBOX_JWT_SECRET`: Override the session token secret
    pub fn apply_env_overrides(&mut self) {
        if let Ok(secret) = std::env::var("SHAREBOX_JWT_SECRET") {
            if !secret.is_empty() {
                self.server.jwt_secret = secret;
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.server.jwt_secret.is_empty() {
            return Err(ShareboxError::Config(
                "jwt_secret is not set. \
                 Set it in config.toml or via SHAREBOX_JWT_SECRET environment variable."
                    .to_string(),
            ));
        }
        if self.files.stream_chunk_size == 0 {
            return Err(ShareboxError::Config(
                "files.stream_chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.files.avatar_dir.is_empty() || self.files.avatar_dir.contains("..") {
            return Err(ShareboxError::Config(
                "files.avatar_dir must be a plain directory name".to_string(),
            ));
        }
        Ok(())
    }
}
