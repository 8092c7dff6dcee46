//! Generic Repository
//!
//! This module provides an abstraction over entity storage backends. Every
//! backend hides soft-deleted rows from all operations: once `deleted_at` is
//! stamped, a record can no longer be read, listed, updated or deleted.

pub mod sqlite_store;
pub mod mock_store;
pub mod config;


use serde::Deserialize;

use crate::entity::{Entity, EntityId, Record};
use crate::error::StorageError;

/// Pagination window for list operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Page {
    /// Number of live records discarded from the front
    pub skip: u32,
    /// Maximum number of records returned
    pub limit: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self { skip: 0, limit: 100 }
    }
}

impl Page {
    pub fn new(skip: u32, limit: u32) -> Self {
        Self { skip, limit }
    }
}

/// Trait defining CRUD storage for a single entity type
pub trait Repository<E: Entity>: Send + Sync {
    /// Persist a new record and return it with its generated fields populated
    fn create(&self, data: E::Create) -> Result<Record<E>, StorageError>;

    /// Fetch a live record
    fn get_by_id(&self, id: EntityId) -> Result<Option<Record<E>>, StorageError>;

    /// List live records in insertion order
    fn get_all(&self, page: Page) -> Result<Vec<Record<E>>, StorageError>;

    /// Apply a partial update to a live record. `None` when no live record has this id.
    fn update(&self, id: EntityId, changes: E::Update) -> Result<Option<Record<E>>, StorageError>;

    /// Soft-delete a live record. `false` when no live record has this id.
    fn delete(&self, id: EntityId) -> Result<bool, StorageError>;

    /// Check whether a live record exists
    fn exists(&self, id: EntityId) -> Result<bool, StorageError>;
}
