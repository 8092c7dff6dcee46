//! Mock implementation of the Repository trait for testing

use crate::entity::{Entity, EntityId, Record};
use crate::error::StorageError;
use crate::repository::{Page, Repository};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

struct MockState<E> {
    next_id: EntityId,
    rows: BTreeMap<EntityId, Record<E>>,
}

impl<E> MockState<E> {
    /// Soft-deleted rows are filtered here and nowhere else
    fn live_mut(&mut self, id: EntityId) -> Option<&mut Record<E>> {
        self.rows.get_mut(&id).filter(|record| !record.is_deleted())
    }

    fn live(&self) -> impl Iterator<Item = &Record<E>> {
        self.rows.values().filter(|record| !record.is_deleted())
    }
}

/// In-memory repository. Rows are kept after soft delete, like the SQLite backend.
pub struct MockRepository<E> {
    state: Mutex<MockState<E>>,
    fail_writes: AtomicBool,
}

impl<E: Entity> MockRepository<E> {
    /// Create a new mock repository
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                next_id: 1,
                rows: BTreeMap::new(),
            }),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Clear all data from the store (useful for test cleanup)
    pub fn clear(&self) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        state.rows.clear();
        Ok(())
    }

    /// Number of stored rows, soft-deleted ones included
    pub fn row_count(&self) -> Result<usize, StorageError> {
        Ok(self.lock()?.rows.len())
    }

    /// Make every subsequent write fail with a storage error without touching state
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn lock(&self) -> Result<MutexGuard<'_, MockState<E>>, StorageError> {
        self.state
            .lock()
            .map_err(|_| StorageError::Unavailable("mock store lock poisoned".to_string()))
    }

    fn check_writable(&self) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("mock store rejected the write".to_string()));
        }
        Ok(())
    }
}

impl<E: Entity> Default for MockRepository<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> Repository<E> for MockRepository<E> {
    fn create(&self, data: E::Create) -> Result<Record<E>, StorageError> {
        let mut state = self.lock()?;
        self.check_writable()?;

        let now = Utc::now();
        let id = state.next_id;
        let record = Record {
            id,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            fields: E::from_create(data),
        };
        state.next_id += 1;
        state.rows.insert(id, record.clone());
        Ok(record)
    }

    fn get_by_id(&self, id: EntityId) -> Result<Option<Record<E>>, StorageError> {
        let mut state = self.lock()?;
        Ok(state.live_mut(id).map(|record| record.clone()))
    }

    fn get_all(&self, page: Page) -> Result<Vec<Record<E>>, StorageError> {
        let state = self.lock()?;
        Ok(state
            .live()
            .skip(page.skip as usize)
            .take(page.limit as usize)
            .cloned()
            .collect())
    }

    fn update(&self, id: EntityId, changes: E::Update) -> Result<Option<Record<E>>, StorageError> {
        let mut state = self.lock()?;
        let Some(record) = state.live_mut(id) else {
            return Ok(None);
        };
        self.check_writable()?;

        record.fields.apply(changes);
        record.updated_at = Utc::now();
        Ok(Some(record.clone()))
    }

    fn delete(&self, id: EntityId) -> Result<bool, StorageError> {
        let mut state = self.lock()?;
        let Some(record) = state.live_mut(id) else {
            return Ok(false);
        };
        self.check_writable()?;

        let now = Utc::now();
        record.deleted_at = Some(now);
        record.updated_at = now;
        Ok(true)
    }

    fn exists(&self, id: EntityId) -> Result<bool, StorageError> {
        let mut state = self.lock()?;
        Ok(state.live_mut(id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::dataset::{Dataset, DatasetCreate, DatasetUpdate, FileType};

    fn excel(name: &str) -> DatasetCreate {
        DatasetCreate {
            name: name.to_string(),
            file_content: vec![0xd0, 0xcf, 0x11, 0xe0],
            file_type: FileType::Excel,
        }
    }

    #[test]
    fn test_mock_repository_basic_operations() {
        let store = MockRepository::<Dataset>::new();

        let first = store.create(excel("q1")).unwrap();
        let second = store.create(excel("q2")).unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);

        assert_eq!(store.get_by_id(first.id).unwrap().unwrap(), first);
        assert!(store.get_by_id(99).unwrap().is_none());

        let renamed = store
            .update(second.id, DatasetUpdate { name: Some("q2-final".to_string()) })
            .unwrap()
            .unwrap();
        assert_eq!(renamed.fields.name, "q2-final");

        assert!(store.delete(first.id).unwrap());
        assert!(!store.delete(first.id).unwrap());
        assert_eq!(store.get_all(Page::default()).unwrap(), vec![renamed]);
        assert_eq!(store.row_count().unwrap(), 2);

        store.clear().unwrap();
        assert_eq!(store.row_count().unwrap(), 0);
    }

    #[test]
    fn test_failed_writes_leave_state_untouched() {
        let store = MockRepository::<Dataset>::new();
        let created = store.create(excel("locked")).unwrap();

        store.set_fail_writes(true);
        assert!(store.create(excel("rejected")).is_err());
        assert!(store
            .update(created.id, DatasetUpdate { name: Some("changed".to_string()) })
            .is_err());
        assert!(store.delete(created.id).is_err());

        // Absent targets are still reported as absent, not as failures
        assert!(store.update(42, DatasetUpdate::default()).unwrap().is_none());
        assert!(!store.delete(42).unwrap());

        store.set_fail_writes(false);
        assert_eq!(store.get_by_id(created.id).unwrap().unwrap(), created);
        assert_eq!(store.row_count().unwrap(), 1);
    }
}
