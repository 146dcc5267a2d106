//! Stripe-based gate serializing state changes per record
//!
//! Each record id hashes to one of a fixed number of stripes. A lock or
//! unlock holds its record's stripe while it changes the store and enqueues
//! the resulting broadcast, so every subscriber sees events for one record in
//! the same order the store applied them. A connecting subscriber's snapshot
//! holds every stripe, so no older event for a record can be enqueued after
//! the snapshot that already reflects it.

use parking_lot::{Mutex, MutexGuard};
use std::time::Duration;
use tasklock_core::RecordId;
use xxhash_rust::xxh3::xxh3_64;

/// Fixed set of stripes guarding record state changes.
pub struct StripeGate {
    stripes: Vec<Mutex<()>>,
    timeout: Duration,
}

/// Holds one or more stripes; released in reverse order on drop.
pub struct GateGuard<'a> {
    _guards: Vec<MutexGuard<'a, ()>>,
}

impl StripeGate {
    /// Create a gate with `num_stripes` stripes (at least one).
    pub fn new(num_stripes: usize, timeout: Duration) -> Self {
        let stripes = (0..num_stripes.max(1)).map(|_| Mutex::new(())).collect();
        Self { stripes, timeout }
    }

    fn stripe_index(&self, record_id: RecordId) -> usize {
        let hash = xxh3_64(&record_id.as_u64().to_le_bytes());
        (hash as usize) % self.stripes.len()
    }

    /// Hold the stripe for `record_id`. Returns `None` on timeout.
    pub fn acquire(&self, record_id: RecordId) -> Option<GateGuard<'_>> {
        let guard = self.stripes[self.stripe_index(record_id)].try_lock_for(self.timeout)?;
        Some(GateGuard {
            _guards: vec![guard],
        })
    }

    /// Hold every stripe. Returns `None` if any stripe times out.
    ///
    /// Stripes are taken in index order, so this never deadlocks against
    /// single-stripe holders or another `acquire_all`.
    pub fn acquire_all(&self) -> Option<GateGuard<'_>> {
        let mut guards = Vec::with_capacity(self.stripes.len());
        for stripe in &self.stripes {
            // Already-held stripes are released when `guards` drops
            guards.push(stripe.try_lock_for(self.timeout)?);
        }
        Some(GateGuard { _guards: guards })
    }

    pub fn num_stripes(&self) -> usize {
        self.stripes.len()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}
