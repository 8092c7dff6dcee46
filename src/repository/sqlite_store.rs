//! SQLite implementation of the Repository trait

use crate::entity::{Entity, EntityId, Record};
use crate::error::StorageError;
use crate::repository::{Page, Repository};
use chrono::Utc;
use log::{debug, info};
use rusqlite::types::ToSql;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::marker::PhantomData;
use std::sync::{Mutex, MutexGuard};

/// Condition identifying rows that have not been soft-deleted
const LIVE_FILTER: &str = "deleted_at IS NULL";

/// SQLite repository holding one connection for a single entity table
pub struct SqliteRepository<E> {
    conn: Mutex<Connection>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> SqliteRepository<E> {
    /// Wrap an open connection, creating the entity table if it does not exist
    pub fn new(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(&Self::schema_sql())?;
        info!("Schema ready for table {}", E::TABLE);
        Ok(Self {
            conn: Mutex::new(conn),
            _entity: PhantomData,
        })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::new(Connection::open_in_memory()?)
    }

    pub fn schema_sql() -> String {
        let columns: String = E::COLUMNS
            .iter()
            .map(|column| format!(",\n    {} {}", column.name, column.declaration))
            .collect();
        format!(
            "CREATE TABLE IF NOT EXISTS {table} (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    deleted_at TEXT{columns}
);
CREATE INDEX IF NOT EXISTS idx_{table}_deleted_at ON {table} (deleted_at);",
            table = E::TABLE,
            columns = columns,
        )
    }

    fn select_columns() -> String {
        let mut columns = vec!["id", "created_at", "updated_at", "deleted_at"];
        columns.extend(E::COLUMNS.iter().map(|column| column.name));
        columns.join(", ")
    }

    /// WHERE clause restricted to live rows, followed by `extra` conditions.
    /// Every statement that reads or mutates existing rows is built from this.
    fn live_where(extra: &str) -> String {
        format!("WHERE {}{}", LIVE_FILTER, extra)
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<Record<E>> {
        Ok(Record {
            id: row.get(0)?,
            created_at: row.get(1)?,
            updated_at: row.get(2)?,
            deleted_at: row.get(3)?,
            fields: E::from_sql(row, 4)?,
        })
    }

    fn fetch_live(conn: &Connection, id: EntityId) -> rusqlite::Result<Option<Record<E>>> {
        let sql = format!(
            "SELECT {} FROM {} {}",
            Self::select_columns(),
            E::TABLE,
            Self::live_where(" AND id = ?1")
        );
        conn.query_row(&sql, params![id], Self::map_row).optional()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Unavailable("database connection lock poisoned".to_string()))
    }
}

impl<E: Entity> Repository<E> for SqliteRepository<E> {
    fn create(&self, data: E::Create) -> Result<Record<E>, StorageError> {
        let fields = E::from_create(data);
        let values = fields.to_sql();
        let now = Utc::now();

        let column_names: Vec<&str> = E::COLUMNS.iter().map(|column| column.name).collect();
        let placeholders: Vec<String> = (1..=E::COLUMNS.len() + 2).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "INSERT INTO {} (created_at, updated_at, {}) VALUES ({})",
            E::TABLE,
            column_names.join(", "),
            placeholders.join(", ")
        );

        let mut params: Vec<&dyn ToSql> = vec![&now as &dyn ToSql, &now];
        params.extend(values.iter().map(|value| value as &dyn ToSql));

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(&sql, params.as_slice())?;
        let id = tx.last_insert_rowid();
        let record = Self::fetch_live(&tx, id)?.ok_or_else(|| {
            StorageError::Unavailable(format!("{} {} vanished after insert", E::NAME, id))
        })?;
        tx.commit()?;

        debug!("Created {} {}", E::NAME, id);
        Ok(record)
    }

    fn get_by_id(&self, id: EntityId) -> Result<Option<Record<E>>, StorageError> {
        let conn = self.lock()?;
        Ok(Self::fetch_live(&conn, id)?)
    }

    fn get_all(&self, page: Page) -> Result<Vec<Record<E>>, StorageError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM {} {} ORDER BY id LIMIT ?1 OFFSET ?2",
            Self::select_columns(),
            E::TABLE,
            Self::live_where("")
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![page.limit, page.skip], Self::map_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    fn update(&self, id: EntityId, changes: E::Update) -> Result<Option<Record<E>>, StorageError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let Some(mut record) = Self::fetch_live(&tx, id)? else {
            return Ok(None);
        };
        record.fields.apply(changes);
        let values = record.fields.to_sql();
        let now = Utc::now();

        let column_count = E::COLUMNS.len();
        let assignments: Vec<String> = E::COLUMNS
            .iter()
            .enumerate()
            .map(|(i, column)| format!("{} = ?{}", column.name, i + 1))
            .collect();
        let sql = format!(
            "UPDATE {} SET {}, updated_at = ?{} {}",
            E::TABLE,
            assignments.join(", "),
            column_count + 1,
            Self::live_where(&format!(" AND id = ?{}", column_count + 2))
        );

        let mut params: Vec<&dyn ToSql> = values.iter().map(|value| value as &dyn ToSql).collect();
        params.push(&now);
        params.push(&id);

        tx.execute(&sql, params.as_slice())?;
        let updated = Self::fetch_live(&tx, id)?;
        tx.commit()?;

        debug!("Updated {} {}", E::NAME, id);
        Ok(updated)
    }

    fn delete(&self, id: EntityId) -> Result<bool, StorageError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let sql = format!(
            "UPDATE {} SET deleted_at = ?1, updated_at = ?1 {}",
            E::TABLE,
            Self::live_where(" AND id = ?2")
        );
        let changed = tx.execute(&sql, params![Utc::now(), id])?;
        tx.commit()?;

        debug!("Soft delete of {} {} affected {} row(s)", E::NAME, id, changed);
        Ok(changed > 0)
    }

    fn exists(&self, id: EntityId) -> Result<bool, StorageError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {} {})",
            E::TABLE,
            Self::live_where(" AND id = ?1")
        );
        Ok(conn.query_row(&sql, params![id], |row| row.get(0))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::dataset::{Dataset, DatasetCreate, DatasetUpdate, FileType};

    fn csv(name: &str) -> DatasetCreate {
        DatasetCreate {
            name: name.to_string(),
            file_content: format!("id,name\n1,{}\n", name).into_bytes(),
            file_type: FileType::Csv,
        }
    }

    fn row_count(store: &SqliteRepository<Dataset>) -> i64 {
        let conn = store.conn.lock().unwrap();
        conn.query_row("SELECT COUNT(*) FROM datasets", [], |row| row.get(0)).unwrap()
    }

    #[test]
    fn test_sqlite_repository_basic_operations() {
        let store = SqliteRepository::<Dataset>::open_in_memory().unwrap();

        let created = store.create(csv("sales")).unwrap();
        assert!(created.id > 0);
        assert_eq!(created.created_at, created.updated_at);
        assert!(!created.is_deleted());

        assert!(store.exists(created.id).unwrap());
        assert!(!store.exists(created.id + 1).unwrap());

        let fetched = store.get_by_id(created.id).unwrap().unwrap();
        assert_eq!(fetched, created);

        let updated = store
            .update(created.id, DatasetUpdate { name: Some("sales-2024".to_string()) })
            .unwrap()
            .unwrap();
        assert_eq!(updated.fields.name, "sales-2024");
        assert_eq!(updated.fields.file_content, created.fields.file_content);
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at >= created.updated_at);

        assert!(store.delete(created.id).unwrap());
        assert!(store.get_by_id(created.id).unwrap().is_none());
        assert!(!store.exists(created.id).unwrap());
        assert_eq!(row_count(&store), 1);
    }

    #[test]
    fn test_soft_deleted_row_keeps_deleted_at() {
        let store = SqliteRepository::<Dataset>::open_in_memory().unwrap();
        let created = store.create(csv("audit")).unwrap();
        assert!(store.delete(created.id).unwrap());

        let conn = store.conn.lock().unwrap();
        let (deleted_at, created_at): (Option<chrono::DateTime<Utc>>, chrono::DateTime<Utc>) = conn
            .query_row(
                "SELECT deleted_at, created_at FROM datasets WHERE id = ?1",
                params![created.id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        let deleted_at = deleted_at.unwrap();
        assert!(deleted_at >= created_at);
    }

    #[test]
    fn test_failed_create_leaves_no_row() {
        let store = SqliteRepository::<Dataset>::open_in_memory().unwrap();
        store
            .conn
            .lock()
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER reject_inserts BEFORE INSERT ON datasets
                 BEGIN SELECT RAISE(ABORT, 'inserts rejected'); END;",
            )
            .unwrap();

        let err = store.create(csv("blocked")).unwrap_err();
        assert!(err.to_string().contains("inserts rejected"));
        assert_eq!(row_count(&store), 0);
    }

    #[test]
    fn test_failed_update_and_delete_roll_back() {
        let store = SqliteRepository::<Dataset>::open_in_memory().unwrap();
        let created = store.create(csv("stable")).unwrap();
        store
            .conn
            .lock()
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER reject_updates BEFORE UPDATE ON datasets
                 BEGIN SELECT RAISE(ABORT, 'updates rejected'); END;",
            )
            .unwrap();

        let err = store
            .update(created.id, DatasetUpdate { name: Some("changed".to_string()) })
            .unwrap_err();
        assert!(err.to_string().contains("updates rejected"));
        assert!(store.delete(created.id).is_err());

        let current = store.get_by_id(created.id).unwrap().unwrap();
        assert_eq!(current, created);
    }

    #[test]
    fn test_records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("datasets.db");

        let created = {
            let store = SqliteRepository::<Dataset>::new(Connection::open(&path).unwrap()).unwrap();
            store
                .create(DatasetCreate {
                    name: "workbook".to_string(),
                    file_content: vec![0x50, 0x4b, 0x03, 0x04, 0x00, 0xff],
                    file_type: FileType::Excel,
                })
                .unwrap()
        };

        let store = SqliteRepository::<Dataset>::new(Connection::open(&path).unwrap()).unwrap();
        let fetched = store.get_by_id(created.id).unwrap().unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.fields.file_type, FileType::Excel);
    }

    #[test]
    fn test_schema_sql_lists_entity_columns() {
        let sql = SqliteRepository::<Dataset>::schema_sql();
        assert!(sql.contains("CREATE TABLE IF NOT EXISTS datasets"));
        assert!(sql.contains("file_content BLOB NOT NULL"));
        assert!(sql.contains("deleted_at TEXT"));
    }
}
