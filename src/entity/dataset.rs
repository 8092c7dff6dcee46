//! Dataset entity: an uploaded CSV or Excel file stored verbatim.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entity::{Column, Entity, EntityId, Record};

/// Kind of tabular file held by a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Csv,
    Excel,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Csv => "csv",
            FileType::Excel => "excel",
        }
    }

    /// Extension used when handing the content back as a file.
    pub fn download_extension(&self) -> &'static str {
        match self {
            FileType::Csv => ".csv",
            FileType::Excel => ".xlsx",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown file type: {0}")]
pub struct UnknownFileType(String);

impl FromStr for FileType {
    type Err = UnknownFileType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(FileType::Csv),
            "excel" => Ok(FileType::Excel),
            _ => Err(UnknownFileType(s.to_string())),
        }
    }
}

/// Stored dataset fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub name: String,
    pub file_content: Vec<u8>,
    pub file_type: FileType,
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dataset(name='{}', type='{}')", self.name, self.file_type)
    }
}

/// Creation payload. Content is normally supplied by the upload route.
#[derive(Debug, Clone, Deserialize)]
pub struct DatasetCreate {
    pub name: String,
    #[serde(default)]
    pub file_content: Vec<u8>,
    pub file_type: FileType,
}

/// Only the name of a dataset can change after creation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatasetUpdate {
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRead {
    pub id: EntityId,
    pub name: String,
    pub file_type: FileType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

fn validate_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("Dataset name must not be empty".to_string());
    }
    // The name becomes the download filename in a response header
    if name.chars().any(char::is_control) {
        return Err("Dataset name must not contain control characters".to_string());
    }
    Ok(())
}

impl Entity for Dataset {
    const NAME: &'static str = "Dataset";
    const TABLE: &'static str = "datasets";
    const COLUMNS: &'static [Column] = &[
        Column { name: "name", declaration: "TEXT NOT NULL" },
        Column { name: "file_content", declaration: "BLOB NOT NULL" },
        Column { name: "file_type", declaration: "TEXT NOT NULL" },
    ];

    type Create = DatasetCreate;
    type Update = DatasetUpdate;
    type Read = DatasetRead;

    fn from_create(data: DatasetCreate) -> Self {
        Self {
            name: data.name,
            file_content: data.file_content,
            file_type: data.file_type,
        }
    }

    fn apply(&mut self, changes: DatasetUpdate) {
        if let Some(name) = changes.name {
            self.name = name;
        }
    }

    fn validate_create(data: &DatasetCreate) -> Result<(), String> {
        validate_name(&data.name)
    }

    fn validate_update(changes: &DatasetUpdate) -> Result<(), String> {
        match &changes.name {
            Some(name) => validate_name(name),
            None => Ok(()),
        }
    }

    fn to_sql(&self) -> Vec<Value> {
        vec![
            Value::Text(self.name.clone()),
            Value::Blob(self.file_content.clone()),
            Value::Text(self.file_type.as_str().to_string()),
        ]
    }

    fn from_sql(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        let file_type_idx = offset + 2;
        let file_type: String = row.get(file_type_idx)?;
        let file_type = file_type.parse::<FileType>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(file_type_idx, Type::Text, Box::new(e))
        })?;

        Ok(Self {
            name: row.get(offset)?,
            file_content: row.get(offset + 1)?,
            file_type,
        })
    }

    fn read(record: &Record<Self>) -> DatasetRead {
        DatasetRead {
            id: record.id,
            name: record.fields.name.clone(),
            file_type: record.fields.file_type,
            created_at: record.created_at,
            updated_at: record.updated_at,
            deleted_at: record.deleted_at,
        }
    }
}
