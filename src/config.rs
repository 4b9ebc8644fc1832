//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Index store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

fn default_db_path() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("stowage").join("index.db").to_string_lossy().to_string())
        .unwrap_or_else(|| "./stowage_index.db".to_string())
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

/// Ingestion consumer configuration
#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_ingest_enabled")]
    pub enabled: bool,

    /// How long a receive call waits for messages, in seconds
    #[serde(default = "default_queue_wait")]
    pub queue_wait_secs: u64,

    /// Maximum messages pulled per receive
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Object store request timeout in milliseconds
    #[serde(default = "default_object_store_timeout")]
    pub object_store_timeout_ms: u64,
}

fn default_ingest_enabled() -> bool {
    true
}

fn default_queue_wait() -> u64 {
    20
}

fn default_batch_size() -> usize {
    10
}

fn default_object_store_timeout() -> u64 {
    10_000
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            enabled: default_ingest_enabled(),
            queue_wait_secs: default_queue_wait(),
            batch_size: default_batch_size(),
            object_store_timeout_ms: default_object_store_timeout(),
        }
    }
}

/// API server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8088
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,

    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("stowage").join("config.toml")),
            Some(PathBuf::from("/etc/stowage/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Reject configurations the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.db_path.trim().is_empty() {
            return Err(ConfigError::Insufficient(
                "store.db_path must not be empty".to_string(),
            ));
        }
        if self.ingest.batch_size == 0 {
            return Err(ConfigError::Insufficient(
                "ingest.batch_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        // Store overrides
        if let Ok(db_path) = std::env::var("STOWAGE_DB_PATH") {
            self.store.db_path = db_path;
        }

        // Ingest overrides
        if let Ok(enabled) = std::env::var("STOWAGE_INGEST_ENABLED") {
            if let Ok(v) = enabled.parse() {
                self.ingest.enabled = v;
            }
        }
        if let Ok(batch) = std::env::var("STOWAGE_INGEST_BATCH_SIZE") {
            if let Ok(v) = batch.parse() {
                self.ingest.batch_size = v;
            }
        }

        // API overrides
        if let Ok(host) = std::env::var("STOWAGE_API_HOST") {
            self.api.host = host;
        }
        if let Ok(port) = std::env::var("STOWAGE_API_PORT") {
            if let Ok(p) = port.parse() {
                self.api.port = p;
            }
        }

        // Logging overrides
        if let Ok(level) = std::env::var("STOWAGE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("STOWAGE_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            ingest: IngestConfig::default(),
            api: ApiConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Insufficient configuration: {0}")]
    Insufficient(String),
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Stowage Configuration
#
# Environment variables override these settings:
# - STOWAGE_DB_PATH
# - STOWAGE_INGEST_ENABLED
# - STOWAGE_INGEST_BATCH_SIZE
# - STOWAGE_API_HOST
# - STOWAGE_API_PORT
# - STOWAGE_LOG_LEVEL
# - STOWAGE_LOG_FORMAT

[store]
# SQLite database holding the file index
db_path = "~/.local/share/stowage/index.db"

[ingest]
# Run the notification consumer in this process
enabled = true

# How long a receive call waits for messages (seconds)
queue_wait_secs = 20

# Maximum messages pulled per receive
batch_size = 10

# Object store request timeout (ms)
object_store_timeout_ms = 10000

[api]
# API server host
host = "0.0.0.0"

# API server port
port = 8088

# Request timeout in seconds
request_timeout_secs = 30

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"

# Optional log file path
# file = "/var/log/stowage/stowage.log"
"#
    .to_string()
}
