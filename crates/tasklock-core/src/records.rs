//! Record collaborator contract.
//!
//! The lock core does not read or write records. This module defines the
//! repository the surrounding CRUD flow uses, an in-memory implementation for
//! tests and demos, and [`RecordService`], which applies the record rules
//! that depend on lock state: a locked record cannot be deleted.

use crate::error::{Result, TasklockError};
use crate::lock_manager::LockManager;
use crate::types::RecordId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub const MAX_TITLE_LEN: usize = 100;
pub const MAX_DESCRIPTION_LEN: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Priority {
    None,
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

/// A record in the shared collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    /// Assigned by the repository on create
    #[serde(default)]
    pub id: RecordId,

    pub title: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub priority: Priority,

    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,

    #[serde(default)]
    pub is_completed: bool,

    /// Set by the repository on create
    #[serde(default = "Utc::now")]
    pub creation_date: DateTime<Utc>,

    /// Set by the repository on update
    #[serde(default)]
    pub last_update_date: Option<DateTime<Utc>>,
}

impl TaskRecord {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: RecordId::default(),
            title: title.into(),
            description: None,
            priority: Priority::default(),
            due_date: None,
            is_completed: false,
            creation_date: Utc::now(),
            last_update_date: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(TasklockError::Validation("title is required".into()));
        }
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(TasklockError::Validation(format!(
                "title must be at most {} characters",
                MAX_TITLE_LEN
            )));
        }
        if let Some(description) = &self.description {
            if description.chars().count() > MAX_DESCRIPTION_LEN {
                return Err(TasklockError::Validation(format!(
                    "description must be at most {} characters",
                    MAX_DESCRIPTION_LEN
                )));
            }
        }
        Ok(())
    }
}

/// One page of a listing. Pages are numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub number: u32,
    pub size: u32,
}

impl Page {
    pub fn new(number: u32, size: u32) -> Result<Self> {
        if number == 0 || size == 0 {
            return Err(TasklockError::Validation(format!(
                "invalid page {} with page size {}",
                number, size
            )));
        }
        Ok(Self { number, size })
    }

    fn offset(&self) -> usize {
        (self.number as usize - 1) * self.size as usize
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            number: 1,
            size: 10,
        }
    }
}

/// Storage for records
#[async_trait]
pub trait RecordRepository: Send + Sync {
    /// Records on `page`, ordered by id
    async fn list(&self, page: Page) -> Result<Vec<TaskRecord>>;

    async fn get(&self, id: RecordId) -> Result<Option<TaskRecord>>;

    /// Store a new record; the returned copy carries the assigned id
    async fn create(&self, record: TaskRecord) -> Result<TaskRecord>;

    /// Replace an existing record. Returns `None` if it does not exist.
    async fn update(&self, record: TaskRecord) -> Result<Option<TaskRecord>>;

    /// Returns `false` if the record did not exist
    async fn delete(&self, id: RecordId) -> Result<bool>;
}

/// In-memory record repository
#[derive(Default)]
pub struct MemoryRecordRepository {
    records: RwLock<BTreeMap<RecordId, TaskRecord>>,
    last_id: AtomicU64,
}

impl MemoryRecordRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordRepository for MemoryRecordRepository {
    async fn list(&self, page: Page) -> Result<Vec<TaskRecord>> {
        let records = self.records.read();
        Ok(records
            .values()
            .skip(page.offset())
            .take(page.size as usize)
            .cloned()
            .collect())
    }

    async fn get(&self, id: RecordId) -> Result<Option<TaskRecord>> {
        Ok(self.records.read().get(&id).cloned())
    }

    async fn create(&self, mut record: TaskRecord) -> Result<TaskRecord> {
        let id = RecordId(self.last_id.fetch_add(1, Ordering::SeqCst) + 1);
        record.id = id;
        record.creation_date = Utc::now();
        record.last_update_date = None;
        self.records.write().insert(id, record.clone());
        Ok(record)
    }

    async fn update(&self, mut record: TaskRecord) -> Result<Option<TaskRecord>> {
        let mut records = self.records.write();
        let Some(existing) = records.get(&record.id) else {
            return Ok(None);
        };
        record.creation_date = existing.creation_date;
        record.last_update_date = Some(Utc::now());
        records.insert(record.id, record.clone());
        Ok(Some(record))
    }

    async fn delete(&self, id: RecordId) -> Result<bool> {
        Ok(self.records.write().remove(&id).is_some())
    }
}

/// Record operations with validation and lock-aware rules
pub struct RecordService {
    repository: Arc<dyn RecordRepository>,
    locks: LockManager,
}

impl RecordService {
    pub fn new(repository: Arc<dyn RecordRepository>, locks: LockManager) -> Self {
        Self { repository, locks }
    }

    pub async fn list(&self, page: Page) -> Result<Vec<TaskRecord>> {
        self.repository.list(page).await
    }

    pub async fn get(&self, id: RecordId) -> Result<TaskRecord> {
        self.repository
            .get(id)
            .await?
            .ok_or_else(|| TasklockError::NotFound(format!("record {}", id)))
    }

    pub async fn create(&self, record: TaskRecord) -> Result<TaskRecord> {
        record.validate()?;
        let created = self.repository.create(record).await?;
        tracing::info!("Created record {}", created.id);
        Ok(created)
    }

    /// Replace record `id` with `record`.
    ///
    /// Lock ownership is not checked; any client may save a record.
    pub async fn update(&self, id: RecordId, record: TaskRecord) -> Result<TaskRecord> {
        if record.id != id {
            return Err(TasklockError::Validation(format!(
                "record id mismatch between the requested id ({}) and the record data ({})",
                id, record.id
            )));
        }
        record.validate()?;
        self.repository
            .update(record)
            .await?
            .ok_or_else(|| TasklockError::NotFound(format!("record {}", id)))
    }

    /// Delete record `id` unless someone is editing it.
    pub async fn delete(&self, id: RecordId) -> Result<()> {
        if self.locks.is_locked(id)? {
            tracing::warn!("Refusing to delete record {} while it is locked", id);
            return Err(TasklockError::Conflict(format!("record {} is locked", id)));
        }
        if !self.repository.delete(id).await? {
            return Err(TasklockError::NotFound(format!("record {}", id)));
        }
        tracing::info!("Deleted record {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn service() -> (RecordService, LockManager) {
        let locks = LockManager::new(Arc::new(MemoryStore::new()));
        let service = RecordService::new(Arc::new(MemoryRecordRepository::new()), locks.clone());
        (service, locks)
    }

    #[tokio::test]
    async fn test_create_assigns_ids() {
        let (service, _) = service();
        let a = service.create(TaskRecord::new("first")).await.unwrap();
        let b = service.create(TaskRecord::new("second")).await.unwrap();

        assert_eq!(a.id, RecordId(1));
        assert_eq!(b.id, RecordId(2));
        assert_eq!(a.priority, Priority::Medium);
        assert_eq!(service.get(RecordId(2)).await.unwrap().title, "second");
    }

    #[tokio::test]
    async fn test_validation() {
        let (service, _) = service();

        let err = service.create(TaskRecord::new("   ")).await.unwrap_err();
        assert!(matches!(err, TasklockError::Validation(_)));

        let long_title = "x".repeat(MAX_TITLE_LEN + 1);
        assert!(service.create(TaskRecord::new(long_title)).await.is_err());

        let long_description = "y".repeat(MAX_DESCRIPTION_LEN + 1);
        let record = TaskRecord::new("ok").with_description(long_description);
        assert!(service.create(record).await.is_err());
    }

    #[tokio::test]
    async fn test_pagination() {
        let (service, _) = service();
        for i in 0..25 {
            service
                .create(TaskRecord::new(format!("task {}", i)))
                .await
                .unwrap();
        }

        let first = service.list(Page::default()).await.unwrap();
        assert_eq!(first.len(), 10);
        assert_eq!(first[0].id, RecordId(1));

        let last = service.list(Page::new(3, 10).unwrap()).await.unwrap();
        assert_eq!(last.len(), 5);
        assert_eq!(last[0].id, RecordId(21));

        assert!(service.list(Page::new(4, 10).unwrap()).await.unwrap().is_empty());
        assert!(Page::new(0, 10).is_err());
    }

    #[tokio::test]
    async fn test_update() {
        let (service, _) = service();
        let created = service.create(TaskRecord::new("draft")).await.unwrap();

        let mut edited = created.clone().with_priority(Priority::Critical);
        edited.title = "final".into();
        edited.is_completed = true;

        let mismatch = service.update(RecordId(99), edited.clone()).await;
        assert!(matches!(mismatch, Err(TasklockError::Validation(_))));

        let updated = service.update(created.id, edited).await.unwrap();
        assert_eq!(updated.title, "final");
        assert_eq!(updated.priority, Priority::Critical);
        assert_eq!(updated.creation_date, created.creation_date);
        assert!(updated.last_update_date.is_some());

        let mut ghost = TaskRecord::new("ghost");
        ghost.id = RecordId(50);
        let missing = service.update(RecordId(50), ghost).await;
        assert!(matches!(missing, Err(TasklockError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_refused_while_locked() {
        let (service, locks) = service();
        let record = service.create(TaskRecord::new("busy")).await.unwrap();

        locks.lock(record.id).unwrap();
        let err = service.delete(record.id).await.unwrap_err();
        assert!(matches!(err, TasklockError::Conflict(_)));

        locks.unlock(record.id).unwrap();
        service.delete(record.id).await.unwrap();

        let err = service.delete(record.id).await.unwrap_err();
        assert!(matches!(err, TasklockError::NotFound(_)));
    }
}
