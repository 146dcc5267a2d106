//! Registry of connected subscribers and per-subscriber delivery.

use crate::error::DeliveryError;
use dashmap::DashMap;
use std::fmt;
use std::panic;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tasklock_core::{observe, ServerMessage};
use tokio::sync::mpsc;

/// Opaque handle of one connected client on the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Outbound channel of one subscriber.
///
/// `deliver` must not block; it only enqueues.
pub trait SubscriberSink: Send + Sync {
    fn deliver(&self, message: ServerMessage) -> Result<(), DeliveryError>;
}

impl SubscriberSink for mpsc::UnboundedSender<ServerMessage> {
    fn deliver(&self, message: ServerMessage) -> Result<(), DeliveryError> {
        self.send(message).map_err(|_| DeliveryError::Closed)
    }
}

/// Outcome of publishing one message to every subscriber
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Connected subscribers, keyed by id
#[derive(Default)]
pub struct SubscriberRegistry {
    subscribers: DashMap<SubscriberId, Arc<dyn SubscriberSink>>,
    next_id: AtomicU64,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, sink: Arc<dyn SubscriberSink>) -> SubscriberId {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.subscribers.insert(id, sink);
        observe::set_subscriber_count(self.subscribers.len());
        id
    }

    /// Returns `false` if `id` was not registered.
    pub fn remove(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers.remove(&id).is_some();
        observe::set_subscriber_count(self.subscribers.len());
        removed
    }

    pub fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Deliver `message` to one subscriber.
    pub fn send_to(&self, id: SubscriberId, message: ServerMessage) -> Result<(), DeliveryError> {
        let sink = self
            .subscribers
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(DeliveryError::UnknownSubscriber(id))?;
        deliver_isolated(id, sink.as_ref(), message)
    }

    /// Deliver `message` to every registered subscriber.
    ///
    /// A subscriber whose channel is broken (or whose sink panics) is logged
    /// and counted as failed; delivery to the rest continues. Broken
    /// subscribers stay registered until their session disconnects them.
    pub fn publish(&self, message: &ServerMessage) -> BroadcastReport {
        let mut report = BroadcastReport::default();

        for entry in self.subscribers.iter() {
            match deliver_isolated(*entry.key(), entry.value().as_ref(), message.clone()) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    tracing::warn!("Broadcast to subscriber {} failed: {}", entry.key(), e);
                    report.failed += 1;
                }
            }
        }

        observe::record_broadcast(report.delivered, report.failed);
        report
    }
}

fn deliver_isolated(
    id: SubscriberId,
    sink: &dyn SubscriberSink,
    message: ServerMessage,
) -> Result<(), DeliveryError> {
    match panic::catch_unwind(panic::AssertUnwindSafe(|| sink.deliver(message))) {
        Ok(result) => result,
        Err(_) => {
            tracing::error!("Sink of subscriber {} panicked during delivery", id);
            Err(DeliveryError::Closed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tasklock_core::RecordId;

    struct PanickingSink;

    impl SubscriberSink for PanickingSink {
        fn deliver(&self, _message: ServerMessage) -> Result<(), DeliveryError> {
            panic!("sink exploded");
        }
    }

    #[test]
    fn test_register_and_remove() {
        let registry = SubscriberRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel::<ServerMessage>();

        let a = registry.register(Arc::new(tx.clone()));
        let b = registry.register(Arc::new(tx));
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);

        assert!(registry.remove(a));
        assert!(!registry.remove(a));
        assert!(!registry.contains(a));
        assert!(registry.contains(b));
    }

    #[test]
    fn test_send_to_unknown_subscriber() {
        let registry = SubscriberRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel::<ServerMessage>();
        let id = registry.register(Arc::new(tx));
        registry.remove(id);

        assert_eq!(
            registry.send_to(id, ServerMessage::TaskLocked(RecordId(1))),
            Err(DeliveryError::UnknownSubscriber(id))
        );
    }

    #[test]
    fn test_publish_isolates_broken_subscribers() {
        let registry = SubscriberRegistry::new();

        let (live_tx, mut live_rx) = mpsc::unbounded_channel();
        let (dead_tx, dead_rx) = mpsc::unbounded_channel::<ServerMessage>();
        drop(dead_rx);

        registry.register(Arc::new(live_tx));
        registry.register(Arc::new(dead_tx));
        registry.register(Arc::new(PanickingSink));

        let report = registry.publish(&ServerMessage::TaskUnlocked(RecordId(9)));
        assert_eq!(
            report,
            BroadcastReport {
                delivered: 1,
                failed: 2
            }
        );
        assert_eq!(
            live_rx.try_recv().unwrap(),
            ServerMessage::TaskUnlocked(RecordId(9))
        );
    }
}
