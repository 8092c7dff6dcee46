//! Application State Management
//!
//! This module provides the application state holding the configured
//! repositories, shared by every worker.

use std::sync::Arc;
use log::info;

use crate::config::AppConfig;
use crate::entity::dataset::Dataset;
use crate::error::StorageError;
use crate::repository::{Repository, config::create_store, mock_store::MockRepository};

/// Application state containing the repositories and configuration
#[derive(Clone)]
pub struct AppState {
    pub datasets: Arc<dyn Repository<Dataset>>,
    pub config: AppConfig,
}

impl AppState {
    /// Create application state from configuration
    pub fn from_config(config: AppConfig) -> Result<Self, StorageError> {
        info!(
            "Initializing application state with {:?} backend at {}",
            config.database.backend, config.database.url
        );

        let datasets = create_store::<Dataset>(&config.database)?;

        info!("Application state initialized successfully");
        Ok(Self { datasets, config })
    }

    /// Create application state for testing with mock backends
    pub fn new_for_testing() -> Self {
        Self {
            datasets: Arc::new(MockRepository::<Dataset>::new()),
            config: AppConfig::default(),
        }
    }
}
