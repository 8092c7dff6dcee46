//! Backend selection for entity repositories

use crate::config::DatabaseConfig;
use crate::database::open_connection;
use crate::entity::Entity;
use crate::error::StorageError;
use crate::repository::{Repository, sqlite_store::SqliteRepository, mock_store::MockRepository};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use log::info;

/// Available repository backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RepositoryBackend {
    #[default]
    SQLite,
    Mock,
}

impl std::str::FromStr for RepositoryBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" => Ok(RepositoryBackend::SQLite),
            "mock" => Ok(RepositoryBackend::Mock),
            _ => Err(format!("Unknown repository backend: {}", s))
        }
    }
}

/// Create a repository for `E` backed by the configured storage engine.
/// The SQLite backend creates the entity table if it does not exist yet.
pub fn create_store<E: Entity>(config: &DatabaseConfig) -> Result<Arc<dyn Repository<E>>, StorageError> {
    match config.backend {
        RepositoryBackend::SQLite => {
            info!("Creating SQLite repository for {}", E::TABLE);
            let conn = open_connection(config)?;
            Ok(Arc::new(SqliteRepository::<E>::new(conn)?))
        }
        RepositoryBackend::Mock => {
            info!("Creating mock repository for {}", E::TABLE);
            Ok(Arc::new(MockRepository::<E>::new()))
        }
    }
}
