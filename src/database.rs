//! database.rs
//!
//! Connection bootstrap for the SQLite storage engine.

use std::path::{Path, PathBuf};

use log::{debug, info};
use rusqlite::Connection;

use crate::config::{ConfigError, DatabaseConfig};
use crate::error::StorageError;

/// Where the database lives, parsed from a connection URL.
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseLocation {
    Memory,
    File(PathBuf),
}

impl DatabaseLocation {
    /// Accepts `sqlite:///path`, `sqlite://path`, `sqlite::memory:`, `:memory:`
    /// or a bare file path.
    pub fn parse(url: &str) -> Result<Self, ConfigError> {
        let path = match url.strip_prefix("sqlite:") {
            Some(rest) => rest.strip_prefix("///").or_else(|| rest.strip_prefix("//")).unwrap_or(rest),
            None if url.contains("://") => {
                return Err(ConfigError::UnsupportedDatabase(url.to_string()));
            }
            None => url,
        };

        if path.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "database.url",
                value: url.to_string(),
            });
        }
        if path == ":memory:" {
            return Ok(DatabaseLocation::Memory);
        }
        Ok(DatabaseLocation::File(PathBuf::from(path)))
    }
}

/// Open a connection for the configured database, creating parent directories as needed.
pub fn open_connection(config: &DatabaseConfig) -> Result<Connection, StorageError> {
    let location = DatabaseLocation::parse(&config.url)
        .map_err(|e| StorageError::Unavailable(e.to_string()))?;

    let conn = match &location {
        DatabaseLocation::Memory => {
            info!("Opening in-memory database");
            Connection::open_in_memory()?
        }
        DatabaseLocation::File(path) => {
            ensure_parent_dir(path)?;
            info!("Opening database at {}", path.display());
            Connection::open(path)?
        }
    };

    if config.wal_mode && location != DatabaseLocation::Memory {
        let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        debug!("Journal mode set to {}", mode);
    }
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    Ok(conn)
}

fn ensure_parent_dir(path: &Path) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::Unavailable(format!("Failed to create directory {}: {}", parent.display(), e))
            })?;
        }
    }
    Ok(())
}
