//! Application configuration.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// File storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Photo upload limits.
    #[serde(default)]
    pub uploads: UploadConfig,
    /// Report lifecycle rules.
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public URL of this deployment.
    pub url: String,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Local file storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory uploaded photos are written to.
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
    /// URL prefix the stored files are served under.
    #[serde(default = "default_storage_base_url")]
    pub base_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
            base_url: default_storage_base_url(),
        }
    }
}

/// Photo upload limits.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// Maximum accepted size of a single photo, in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: usize,
    /// Maximum number of photos per report.
    #[serde(default = "default_max_files")]
    pub max_files: usize,
    /// Photos are shrunk to fit inside this width.
    #[serde(default = "default_max_width")]
    pub max_width: u32,
    /// Photos are shrunk to fit inside this height.
    #[serde(default = "default_max_height")]
    pub max_height: u32,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
            max_files: default_max_files(),
            max_width: default_max_width(),
            max_height: default_max_height(),
        }
    }
}

/// Report lifecycle configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LifecycleConfig {
    /// Reject status changes that are not in the transition table.
    ///
    /// When `false`, any known status may be set from any other.
    #[serde(default = "default_true")]
    pub strict_transitions: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            strict_transitions: true,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    5000
}

const fn default_max_connections() -> u32 {
    20
}

const fn default_min_connections() -> u32 {
    2
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("./uploads")
}

fn default_storage_base_url() -> String {
    "/api/uploads".to_string()
}

const fn default_max_file_size() -> usize {
    5 * 1024 * 1024
}

const fn default_max_files() -> usize {
    5
}

const fn default_max_width() -> u32 {
    1200
}

const fn default_max_height() -> u32 {
    900
}

const fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `.env` (if present, via dotenvy)
    /// 2. `config/default.toml`
    /// 3. `config/{environment}.toml` (based on `SAMVAD_ENV`)
    /// 4. Environment variables with `SAMVAD__` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        // A missing .env file is normal outside local development.
        let _ = dotenvy::dotenv();

        let env = std::env::var("SAMVAD_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("SAMVAD")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("SAMVAD")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Address the HTTP listener binds to.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
