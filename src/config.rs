//! Application Configuration
//!
//! This module provides configuration management for the application,
//! supporting YAML configuration files with sensible defaults and
//! environment variable overrides.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use log::{info, warn};
use thiserror::Error;

use crate::repository::config::RepositoryBackend;

/// Environment variable naming the YAML configuration file
pub const CONFIG_FILE_ENV: &str = "CONFIG_FILE";
const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Environment variables that override individual settings
pub const ENV_OVERRIDES: [&str; 7] = [
    "DATABASE_URL",
    "DATABASE_BACKEND",
    "UPLOAD_DIR",
    "HOST",
    "PORT",
    "DEBUG",
    "ALLOWED_ORIGINS",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },

    #[error("unsupported database url: {0}")]
    UnsupportedDatabase(String),
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Directory created at start-up for uploaded files
    pub upload_dir: String,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Number of worker threads
    pub workers: usize,
    /// Maximum request payload size in bytes
    pub max_payload_size: usize,
    pub debug: bool,
    /// CORS origins; `*` allows any origin
    pub allowed_origins: Vec<String>,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub backend: RepositoryBackend,
    /// Connection URL, e.g. `sqlite:///emc_explore.db`
    pub url: String,
    /// Enable WAL journal mode for file databases
    pub wal_mode: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Path to log4rs configuration file
    pub config_file: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            upload_dir: "uploads".to_string(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            workers: 4,
            max_payload_size: 100 * 1024 * 1024, // 100MB
            debug: true,
            allowed_origins: vec!["http://localhost:3000".to_string()],
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: RepositoryBackend::SQLite,
            url: "sqlite:///emc_explore.db".to_string(),
            wal_mode: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            config_file: "server_log.yaml".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file, use defaults if not found, then apply environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file(Self::config_file_path())?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// `CONFIG_FILE` if set, otherwise `config.yaml` in the working directory
    pub fn config_file_path() -> PathBuf {
        env::var_os(CONFIG_FILE_ENV).map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from)
    }

    /// Report where the loaded settings came from. Configuration is read
    /// before the logger exists, so binaries call this after `init_logging`.
    pub fn log_sources(&self) {
        let config_path = Self::config_file_path();
        if config_path.exists() {
            info!("Loaded configuration from {}", config_path.display());
        } else {
            warn!("Config file {} not found, using defaults", config_path.display());
        }
        for key in ENV_OVERRIDES.iter().filter(|key| env::var_os(key).is_some()) {
            info!("{} overridden from environment", key);
        }
        info!("Using {:?} repository at {}", self.database.backend, self.database.url);
    }

    /// Read a YAML configuration file; missing keys take their defaults
    pub fn from_file(config_path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config_path = config_path.as_ref();
        if config_path.exists() {
            let content = fs::read_to_string(config_path)?;
            Self::from_yaml(&content)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Override settings from `DATABASE_URL`, `DATABASE_BACKEND`, `UPLOAD_DIR`,
    /// `HOST`, `PORT`, `DEBUG` and `ALLOWED_ORIGINS`
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(url) = env::var("DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(backend) = env::var("DATABASE_BACKEND") {
            self.database.backend = backend.parse().map_err(|_| ConfigError::InvalidValue {
                key: "DATABASE_BACKEND",
                value: backend.clone(),
            })?;
        }
        if let Ok(upload_dir) = env::var("UPLOAD_DIR") {
            self.upload_dir = upload_dir;
        }
        if let Ok(host) = env::var("HOST") {
            self.server.host = host;
        }
        if let Ok(port) = env::var("PORT") {
            self.server.port = port.parse().map_err(|_| ConfigError::InvalidValue {
                key: "PORT",
                value: port.clone(),
            })?;
        }
        if let Ok(debug) = env::var("DEBUG") {
            self.server.debug = parse_bool(&debug).ok_or(ConfigError::InvalidValue {
                key: "DEBUG",
                value: debug.clone(),
            })?;
        }
        if let Ok(origins) = env::var("ALLOWED_ORIGINS") {
            self.server.allowed_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect();
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for key in ENV_OVERRIDES {
            env::remove_var(key);
        }
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.database.url, "sqlite:///emc_explore.db");
        assert_eq!(config.database.backend, RepositoryBackend::SQLite);
        assert_eq!(config.upload_dir, "uploads");
        assert_eq!(config.server.allowed_origins, vec!["http://localhost:3000"]);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = AppConfig::from_yaml(
            "server:\n  port: 9000\ndatabase:\n  backend: Mock\nupload_dir: /tmp/uploads\n",
        )
        .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.workers, 4);
        assert_eq!(config.database.backend, RepositoryBackend::Mock);
        assert_eq!(config.database.url, "sqlite:///emc_explore.db");
        assert_eq!(config.upload_dir, "/tmp/uploads");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::from_file(dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.upload_dir, "uploads");
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_env();
        env::set_var("DATABASE_URL", "sqlite::memory:");
        env::set_var("DATABASE_BACKEND", "mock");
        env::set_var("PORT", "8123");
        env::set_var("DEBUG", "false");
        env::set_var("ALLOWED_ORIGINS", "http://a.example, http://b.example");

        let mut config = AppConfig::default();
        config.apply_env_overrides().unwrap();
        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.database.backend, RepositoryBackend::Mock);
        assert_eq!(config.server.port, 8123);
        assert!(!config.server.debug);
        assert_eq!(config.server.allowed_origins, vec!["http://a.example", "http://b.example"]);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_config_file_path_follows_environment() {
        env::remove_var(CONFIG_FILE_ENV);
        assert_eq!(AppConfig::config_file_path(), PathBuf::from("config.yaml"));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.yaml");
        fs::write(&path, "server:\n  port: 9100\n").unwrap();
        env::set_var(CONFIG_FILE_ENV, &path);
        assert_eq!(AppConfig::config_file_path(), path);

        clear_env();
        let config = AppConfig::load().unwrap();
        assert_eq!(config.server.port, 9100);
        config.log_sources();

        env::remove_var(CONFIG_FILE_ENV);
    }

    #[test]
    #[serial]
    fn test_invalid_env_override_is_an_error() {
        clear_env();
        env::set_var("PORT", "not-a-port");

        let mut config = AppConfig::default();
        let result = config.apply_env_overrides();
        assert!(matches!(result, Err(ConfigError::InvalidValue { key: "PORT", .. })));

        clear_env();
    }
}
