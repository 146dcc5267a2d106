//! Record-level advisory locks on top of a [`KeyValueStore`].
//!
//! Each locked record is a single entry in the store under a namespaced key
//! (`TaskLocked_<id>`). Presence of the entry is the lock. Only this module
//! knows the key encoding; everything else talks in [`RecordId`]s.
//!
//! Both operations are idempotent: locking a locked record and unlocking an
//! unlocked record are logged and reported as [`LockOutcome::Redundant`],
//! never as errors.

use crate::error::{Result, TasklockError};
use crate::observe;
use crate::store::KeyValueStore;
use crate::types::{LockEntry, RecordId};
use std::collections::BTreeSet;
use std::sync::Arc;

const KEY_PREFIX: &str = "TaskLocked_";

/// Store key for a locked record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LockKey(String);

impl LockKey {
    pub(crate) fn build(record_id: RecordId) -> Self {
        Self(format!("{}{}", KEY_PREFIX, record_id.0))
    }

    /// Decode a store key back to its record id.
    ///
    /// Only the exact form produced by [`build`](Self::build) is accepted:
    /// keys from other namespaces, signs, leading zeros and trailing text all
    /// yield `None`.
    pub(crate) fn extract(key: &str) -> Option<RecordId> {
        let digits = key.strip_prefix(KEY_PREFIX)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        if digits.len() > 1 && digits.starts_with('0') {
            return None;
        }
        digits.parse::<u64>().ok().map(RecordId)
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}

/// Result of a lock or unlock request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOutcome {
    /// The record changed state
    Applied,
    /// The record was already in the requested state; nothing changed
    Redundant,
}

impl LockOutcome {
    pub fn is_applied(self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Lock manager for record identifiers
///
/// The store is injected by the owner and shared through an `Arc`; its
/// lifetime is the lifetime of the process that created it.
#[derive(Clone)]
pub struct LockManager {
    store: Arc<dyn KeyValueStore<LockEntry>>,
}

impl LockManager {
    pub fn new(store: Arc<dyn KeyValueStore<LockEntry>>) -> Self {
        Self { store }
    }

    /// Lock `record_id`.
    ///
    /// If the record is already locked the existing entry is left untouched
    /// (its `locked_at` is not reset).
    pub fn lock(&self, record_id: RecordId) -> Result<LockOutcome> {
        let key = LockKey::build(record_id);
        let inserted = self
            .store
            .put_if_absent(key.as_str(), LockEntry::new(record_id))
            .map_err(|e| TasklockError::lock_failure("lock", record_id, e))?;

        if inserted {
            tracing::info!("Record {} locked", record_id);
            observe::record_lock(true);
            Ok(LockOutcome::Applied)
        } else {
            tracing::info!("Record {} is already locked", record_id);
            observe::record_lock(false);
            Ok(LockOutcome::Redundant)
        }
    }

    /// Unlock `record_id`.
    pub fn unlock(&self, record_id: RecordId) -> Result<LockOutcome> {
        let key = LockKey::build(record_id);
        let removed = self
            .store
            .remove(key.as_str())
            .map_err(|e| TasklockError::lock_failure("unlock", record_id, e))?;

        if removed.is_some() {
            tracing::info!("Record {} unlocked", record_id);
            observe::record_unlock(true);
            Ok(LockOutcome::Applied)
        } else {
            tracing::info!("Record {} is not locked, nothing to unlock", record_id);
            observe::record_unlock(false);
            Ok(LockOutcome::Redundant)
        }
    }

    /// Whether `record_id` is currently locked.
    ///
    /// A store failure is returned as an error, never as `false`.
    pub fn is_locked(&self, record_id: RecordId) -> Result<bool> {
        let key = LockKey::build(record_id);
        self.store
            .get(key.as_str())
            .map(|entry| entry.is_some())
            .map_err(|e| TasklockError::lock_failure("query", record_id, e))
    }

    /// The entry held for `record_id`, if locked.
    pub fn entry(&self, record_id: RecordId) -> Result<Option<LockEntry>> {
        let key = LockKey::build(record_id);
        self.store
            .get(key.as_str())
            .map_err(|e| TasklockError::lock_failure("query", record_id, e))
    }

    /// All currently locked records.
    ///
    /// Computed fresh from the store's keys on every call. Keys outside the
    /// lock namespace are skipped.
    pub fn locked_ids(&self) -> Result<BTreeSet<RecordId>> {
        let keys = self.store.keys()?;
        Ok(keys.iter().filter_map(|key| LockKey::extract(key)).collect())
    }
}
