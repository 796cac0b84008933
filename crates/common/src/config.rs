//! Application configuration.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Page cache configuration.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Uploaded file storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Site presentation settings.
    #[serde(default)]
    pub site: SiteConfig,
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
    /// Public URL of this instance.
    #[serde(default = "default_url")]
    pub url: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Maximum accepted request body size (uploads included).
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Connection URL (`postgres://...` or `sqlite://...`).
    #[serde(default = "default_database_url")]
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Page cache configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// How long a rendered index page stays cached. Zero disables the cache.
    #[serde(default = "default_index_ttl_secs")]
    pub index_ttl_secs: u64,
    /// Maximum number of cached pages.
    #[serde(default = "default_max_entries")]
    pub max_entries: u64,
}

/// Local file storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory uploaded files are written to.
    #[serde(default = "default_storage_path")]
    pub base_path: PathBuf,
    /// URL prefix uploaded files are served under.
    #[serde(default = "default_storage_url")]
    pub base_url: String,
}

/// Site presentation settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Site name shown in page titles and the header.
    #[serde(default = "default_site_name")]
    pub name: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

fn default_url() -> String {
    "http://localhost:3000".to_string()
}

const fn default_request_timeout_secs() -> u64 {
    30
}

const fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_database_url() -> String {
    "sqlite://quill.db?mode=rwc".to_string()
}

const fn default_max_connections() -> u32 {
    100
}

const fn default_min_connections() -> u32 {
    5
}

const fn default_index_ttl_secs() -> u64 {
    20
}

const fn default_max_entries() -> u64 {
    1000
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("./media")
}

fn default_storage_url() -> String {
    "/media".to_string()
}

fn default_site_name() -> String {
    "Quill".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            url: default_url(),
            request_timeout_secs: default_request_timeout_secs(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            index_ttl_secs: default_index_ttl_secs(),
            max_entries: default_max_entries(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_path: default_storage_path(),
            base_url: default_storage_url(),
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            name: default_site_name(),
        }
    }
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `.env` (if present, exported into the process environment)
    /// 2. `config/default.toml`
    /// 3. `config/{environment}.toml` (based on `QUILL_ENV`)
    /// 4. Environment variables with `QUILL__` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let env = std::env::var("QUILL_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("QUILL")
                    .prefix_separator("__")
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
                config::Environment::with_prefix("QUILL")
                    .prefix_separator("__")
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
