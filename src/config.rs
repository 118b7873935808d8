//! Configuration module for homenas.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::{NasError, Result};

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
    /// Whether to serve the OpenAPI document at `/api-docs/openapi.json`.
    #[serde(default = "default_serve_openapi")]
    pub serve_openapi: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_serve_openapi() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![],
            serve_openapi: default_serve_openapi(),
        }
    }
}

/// Storage root configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory every client path is sandboxed beneath.
    #[serde(default = "default_storage_root")]
    pub root: String,
    /// Reject escaping paths with an error instead of clamping them to the root.
    #[serde(default)]
    pub reject_path_escapes: bool,
    /// Create the root directory at startup if it is missing.
    #[serde(default = "default_create_root")]
    pub create_root: bool,
}

fn default_storage_root() -> String {
    "data/storage".to_string()
}

fn default_create_root() -> bool {
    true
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            reject_path_escapes: false,
            create_root: default_create_root(),
        }
    }
}

/// Chunked upload configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// Maximum size of one chunk in megabytes.
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size_mb: u64,
    /// Deadline for writing one chunk, in seconds.
    #[serde(default = "default_chunk_timeout")]
    pub chunk_timeout_secs: u64,
    /// Idle time after which an unfinished upload session is abandoned.
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,
}

fn default_max_chunk_size() -> u64 {
    16
}

fn default_chunk_timeout() -> u64 {
    300
}

const BYTES_PER_MB: u64 = 1024 * 1024;

fn default_session_ttl() -> u64 {
    3600
}

impl UploadConfig {
    /// Chunk size limit in bytes, saturating at `u64::MAX`.
    pub fn max_chunk_size_bytes(&self) -> u64 {
        self.max_chunk_size_mb.saturating_mul(BYTES_PER_MB)
    }

    /// Chunk write deadline.
    pub fn chunk_timeout(&self) -> Duration {
        Duration::from_secs(self.chunk_timeout_secs)
    }

    /// Session idle limit.
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_chunk_size_mb: default_max_chunk_size(),
            chunk_timeout_secs: default_chunk_timeout(),
            session_ttl_secs: default_session_ttl(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
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
    "logs/homenas.log".to_string()
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
    /// Storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Upload configuration.
    #[serde(default)]
    pub upload: UploadConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(NasError::Io)?;
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
        toml::from_str(s).map_err(|e| NasError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `HOMENAS_STORAGE_ROOT`: Override the storage root directory
    /// - `HOMENAS_PORT`: Override the listening port
    pub fn apply_env_overrides(&mut self) {
        if let Ok(root) = std::env::var("HOMENAS_STORAGE_ROOT") {
            if !root.is_empty() {
                self.storage.root = root;
            }
        }

        if let Ok(port) = std::env::var("HOMENAS_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.storage.root.trim().is_empty() {
            return Err(NasError::Config("storage.root must not be empty".to_string()));
        }
        if self.upload.max_chunk_size_mb == 0 {
            return Err(NasError::Config(
                "upload.max_chunk_size_mb must be greater than zero".to_string(),
            ));
        }
        if self.upload.max_chunk_size_mb.checked_mul(BYTES_PER_MB).is_none() {
            return Err(NasError::Config(format!(
                "upload.max_chunk_size_mb {} does not fit in bytes",
                self.upload.max_chunk_size_mb
            )));
        }
        if self.upload.chunk_timeout_secs == 0 {
            return Err(NasError::Config(
                "upload.chunk_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
