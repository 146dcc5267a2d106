//! Concurrent key-value store backing the lock namespace.
//!
//! The store is a plain mapping from string keys to values of one type. It
//! knows nothing about locks: the [`LockManager`](crate::LockManager) owns the
//! key encoding, so several subsystems can share one store by using distinct
//! key prefixes.
//!
//! Every operation returns a [`Result`] so that implementations backed by a
//! remote cache can report an unreachable store as
//! [`TasklockError::StoreUnavailable`](crate::TasklockError::StoreUnavailable)
//! rather than as a missing key. [`MemoryStore`] never fails.

use crate::error::Result;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Contract for the store shared by the lock manager.
///
/// Operations on a single key are linearizable with respect to each other.
/// There is no atomicity across keys, and [`keys`](KeyValueStore::keys) is a
/// weakly consistent point-in-time view.
pub trait KeyValueStore<V>: Send + Sync {
    /// Insert or overwrite the value for `key`.
    fn put(&self, key: &str, value: V) -> Result<()>;

    /// Insert `value` only if `key` is vacant.
    ///
    /// Returns `true` if the value was inserted. Check and insert happen as
    /// one step, so concurrent callers racing on the same key see exactly one
    /// `true`.
    fn put_if_absent(&self, key: &str, value: V) -> Result<bool>;

    /// Current value for `key`, if any.
    fn get(&self, key: &str) -> Result<Option<V>>;

    /// Remove `key`, returning the value it held. Removing an absent key is a no-op.
    fn remove(&self, key: &str) -> Result<Option<V>>;

    /// Snapshot of all keys currently present.
    fn keys(&self) -> Result<Vec<String>>;
}

/// In-memory store backed by a sharded concurrent map.
pub struct MemoryStore<V> {
    entries: DashMap<String, V>,
}

impl<V> MemoryStore<V> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V> Default for MemoryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone + Send + Sync> KeyValueStore<V> for MemoryStore<V> {
    fn put(&self, key: &str, value: V) -> Result<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn put_if_absent(&self, key: &str, value: V) -> Result<bool> {
        // The entry guard holds the shard write lock across check and insert
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(value);
                Ok(true)
            }
        }
    }

    fn get(&self, key: &str) -> Result<Option<V>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    fn remove(&self, key: &str) -> Result<Option<V>> {
        Ok(self.entries.remove(key).map(|(_, value)| value))
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.iter().map(|entry| entry.key().clone()).collect())
    }
}
