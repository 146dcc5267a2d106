use crate::error::{HubError, Result};
use crate::registry::{BroadcastReport, SubscriberId, SubscriberRegistry, SubscriberSink};
use crate::stripes::StripeGate;
use std::sync::Arc;
use tasklock_core::{
    HubConfig, LockEntry, LockManager, LockOutcome, MemoryStore, RecordId, ServerMessage,
};

/// Server side of the real-time lock channel
///
/// Owns the subscriber registry and routes lock requests through the
/// [`LockManager`]. A change of lock state is pushed to every registered
/// subscriber, the requester included, so all clients update through the
/// same event path. A newly registered subscriber receives the full lock
/// snapshot, and only that subscriber receives it.
///
/// Locks are not tied to subscribers: disconnecting never unlocks anything,
/// and any subscriber may unlock any record.
pub struct BroadcastHub {
    locks: LockManager,
    subscribers: SubscriberRegistry,
    gate: StripeGate,
}

impl BroadcastHub {
    pub fn new(locks: LockManager, config: &HubConfig) -> Self {
        Self {
            locks,
            subscribers: SubscriberRegistry::new(),
            gate: StripeGate::new(config.stripe_count, config.gate_timeout()),
        }
    }

    /// Hub backed by a fresh in-memory lock store
    pub fn in_memory(config: &HubConfig) -> Self {
        let store: Arc<MemoryStore<LockEntry>> = Arc::new(MemoryStore::new());
        Self::new(LockManager::new(store), config)
    }

    /// Register a subscriber and push it the current lock snapshot.
    ///
    /// The snapshot is computed after registration, while every stripe is
    /// held, so events enqueued for this subscriber afterwards are never older
    /// than the snapshot. If the snapshot cannot be computed the subscriber is
    /// removed again and the error returned.
    pub fn on_subscriber_connected(&self, sink: Arc<dyn SubscriberSink>) -> Result<SubscriberId> {
        let Some(_gate) = self.gate.acquire_all() else {
            return Err(HubError::SnapshotBusy {
                timeout_ms: self.gate.timeout().as_millis() as u64,
            });
        };
        let subscriber = self.subscribers.register(sink);

        let snapshot = match self.locks.locked_ids() {
            Ok(ids) => ids,
            Err(e) => {
                tracing::error!("Failed to snapshot locks for subscriber {}: {}", subscriber, e);
                self.subscribers.remove(subscriber);
                return Err(e.into());
            }
        };

        let locked = snapshot.len();
        if let Err(e) = self
            .subscribers
            .send_to(subscriber, ServerMessage::SendLockedTasksOnConnect(snapshot))
        {
            tracing::warn!("Could not send snapshot to subscriber {}: {}", subscriber, e);
        }

        tracing::info!(
            "Subscriber {} connected ({} locked records, {} subscribers)",
            subscriber,
            locked,
            self.subscribers.len()
        );
        Ok(subscriber)
    }

    /// Lock `record_id` on behalf of `subscriber`.
    ///
    /// `TaskLocked` is broadcast only when the record actually changed state;
    /// a redundant request broadcasts nothing.
    pub fn request_lock(&self, subscriber: SubscriberId, record_id: RecordId) -> Result<LockOutcome> {
        let _gate = self.gate.acquire(record_id).ok_or(HubError::RecordBusy {
            op: "lock",
            record_id,
            timeout_ms: self.gate.timeout().as_millis() as u64,
        })?;

        let outcome = self.locks.lock(record_id)?;
        if outcome.is_applied() {
            let report = self.broadcast(ServerMessage::TaskLocked(record_id));
            tracing::debug!(
                "Subscriber {} locked record {}, delivered to {} ({} failed)",
                subscriber,
                record_id,
                report.delivered,
                report.failed
            );
        } else {
            tracing::debug!(
                "Subscriber {} asked to lock record {} which is already locked",
                subscriber,
                record_id
            );
        }
        Ok(outcome)
    }

    /// Unlock `record_id` on behalf of `subscriber`.
    pub fn request_unlock(
        &self,
        subscriber: SubscriberId,
        record_id: RecordId,
    ) -> Result<LockOutcome> {
        let _gate = self.gate.acquire(record_id).ok_or(HubError::RecordBusy {
            op: "unlock",
            record_id,
            timeout_ms: self.gate.timeout().as_millis() as u64,
        })?;

        let outcome = self.locks.unlock(record_id)?;
        if outcome.is_applied() {
            let report = self.broadcast(ServerMessage::TaskUnlocked(record_id));
            tracing::debug!(
                "Subscriber {} unlocked record {}, delivered to {} ({} failed)",
                subscriber,
                record_id,
                report.delivered,
                report.failed
            );
        } else {
            tracing::debug!(
                "Subscriber {} asked to unlock record {} which is not locked",
                subscriber,
                record_id
            );
        }
        Ok(outcome)
    }

    /// Deregister `subscriber`. Records it locked stay locked.
    pub fn on_subscriber_disconnected(&self, subscriber: SubscriberId) {
        if self.subscribers.remove(subscriber) {
            tracing::info!(
                "Subscriber {} disconnected ({} subscribers)",
                subscriber,
                self.subscribers.len()
            );
        } else {
            tracing::debug!("Subscriber {} was already deregistered", subscriber);
        }
    }

    fn broadcast(&self, message: ServerMessage) -> BroadcastReport {
        self.subscribers.publish(&message)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn lock_manager(&self) -> &LockManager {
        &self.locks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use tokio::sync::mpsc;

    fn hub() -> BroadcastHub {
        BroadcastHub::in_memory(&HubConfig::default().with_stripes(8))
    }

    fn connect(hub: &BroadcastHub) -> (SubscriberId, mpsc::UnboundedReceiver<ServerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = hub.on_subscriber_connected(Arc::new(tx)).unwrap();
        (id, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    #[test]
    fn test_connect_receives_empty_snapshot() {
        let hub = hub();
        let (_, mut rx) = connect(&hub);
        assert_eq!(
            drain(&mut rx),
            vec![ServerMessage::SendLockedTasksOnConnect(BTreeSet::new())]
        );
        assert_eq!(hub.subscriber_count(), 1);
    }

    #[test]
    fn test_redundant_lock_not_broadcast() {
        let hub = hub();
        let (a, mut rx) = connect(&hub);
        drain(&mut rx);

        assert_eq!(hub.request_lock(a, RecordId(1)).unwrap(), LockOutcome::Applied);
        assert_eq!(
            hub.request_lock(a, RecordId(1)).unwrap(),
            LockOutcome::Redundant
        );
        assert_eq!(
            hub.request_unlock(a, RecordId(2)).unwrap(),
            LockOutcome::Redundant
        );

        assert_eq!(drain(&mut rx), vec![ServerMessage::TaskLocked(RecordId(1))]);
    }

    #[test]
    fn test_disconnect_keeps_locks() {
        let hub = hub();
        let (a, _rx) = connect(&hub);
        hub.request_lock(a, RecordId(11)).unwrap();

        hub.on_subscriber_disconnected(a);
        hub.on_subscriber_disconnected(a);

        assert_eq!(hub.subscriber_count(), 0);
        assert!(hub.lock_manager().is_locked(RecordId(11)).unwrap());
    }

    #[test]
    fn test_held_stripe_makes_record_busy() {
        let hub = BroadcastHub::in_memory(&HubConfig::default().with_gate_timeout(20));
        let (a, mut rx) = connect(&hub);
        drain(&mut rx);

        let held = hub.gate.acquire(RecordId(4)).unwrap();
        let err = hub.request_lock(a, RecordId(4)).unwrap_err();
        assert!(matches!(
            err,
            HubError::RecordBusy {
                op: "lock",
                record_id: RecordId(4),
                timeout_ms: 20
            }
        ));
        let err = hub.request_unlock(a, RecordId(4)).unwrap_err();
        assert!(matches!(err, HubError::RecordBusy { op: "unlock", .. }));
        drop(held);

        assert!(!hub.lock_manager().is_locked(RecordId(4)).unwrap());
        assert!(drain(&mut rx).is_empty());
        assert_eq!(hub.request_lock(a, RecordId(4)).unwrap(), LockOutcome::Applied);
    }

    #[test]
    fn test_held_stripe_makes_snapshot_busy() {
        let hub = BroadcastHub::in_memory(&HubConfig::default().with_gate_timeout(20));
        let held = hub.gate.acquire(RecordId(1)).unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let err = hub.on_subscriber_connected(Arc::new(tx)).unwrap_err();
        assert!(matches!(err, HubError::SnapshotBusy { timeout_ms: 20 }));
        assert_eq!(hub.subscriber_count(), 0);
        assert!(rx.try_recv().is_err());

        drop(held);
        connect(&hub);
        assert_eq!(hub.subscriber_count(), 1);
    }

    #[test]
    fn test_any_subscriber_may_unlock() {
        let hub = hub();
        let (a, mut rx_a) = connect(&hub);
        let (b, _rx_b) = connect(&hub);
        drain(&mut rx_a);

        hub.request_lock(a, RecordId(6)).unwrap();
        assert_eq!(
            hub.request_unlock(b, RecordId(6)).unwrap(),
            LockOutcome::Applied
        );
        assert_eq!(
            drain(&mut rx_a),
            vec![
                ServerMessage::TaskLocked(RecordId(6)),
                ServerMessage::TaskUnlocked(RecordId(6))
            ]
        );
    }
}
