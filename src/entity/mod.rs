//! Entity Model
//!
//! Every stored resource is a [`Record`]: system-managed identity and
//! lifecycle timestamps wrapped around the type-specific fields of an
//! [`Entity`]. The entity type also describes its own create/update/read
//! schemas and how its fields map onto storage columns.

pub mod dataset;

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::Row;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Identifier assigned by the storage engine.
pub type EntityId = i64;

/// A persisted entity together with its system-managed fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Record<E> {
    /// Assigned on creation, never changes
    pub id: EntityId,
    /// Set once at creation
    pub created_at: DateTime<Utc>,
    /// Refreshed on every successful mutation
    pub updated_at: DateTime<Utc>,
    /// `Some` once the record has been soft-deleted; never cleared
    pub deleted_at: Option<DateTime<Utc>>,
    /// Type-specific fields
    pub fields: E,
}

impl<E> Record<E> {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Storage column owned by an entity type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Column {
    pub name: &'static str,
    /// SQL declaration following the column name, e.g. `TEXT NOT NULL`
    pub declaration: &'static str,
}

/// A resource type managed by the generic repository and handler.
pub trait Entity: Clone + Send + Sync + 'static {
    /// Human-readable name used in error messages
    const NAME: &'static str;
    /// Storage table
    const TABLE: &'static str;
    /// Type-specific columns, in the order used by [`Entity::to_sql`] and [`Entity::from_sql`]
    const COLUMNS: &'static [Column];

    /// Creation payload. Excludes every system-managed field.
    type Create: DeserializeOwned + Send + 'static;
    /// Partial update payload. Every field is optional; `None` leaves the stored value untouched.
    type Update: DeserializeOwned + Default + Send + 'static;
    /// Representation returned to callers.
    type Read: Serialize;

    fn from_create(data: Self::Create) -> Self;

    /// Apply the provided fields of `changes` onto `self`.
    fn apply(&mut self, changes: Self::Update);

    fn validate_create(_data: &Self::Create) -> Result<(), String> {
        Ok(())
    }

    fn validate_update(_changes: &Self::Update) -> Result<(), String> {
        Ok(())
    }

    fn to_sql(&self) -> Vec<Value>;

    /// Decode the entity columns starting at `offset` in `row`.
    fn from_sql(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self>;

    fn read(record: &Record<Self>) -> Self::Read;
}
