//! Clients talking to an in-process hub

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tasklock_client::{ClientError, ClientLockProxy, ConnectionState};
use tasklock_core::{
    ClientConfig, HubConfig, KeyValueStore, LockEntry, LockEvent, LockManager, RecordId, Result,
    TasklockError,
};
use tasklock_hub::{BroadcastHub, LocalTransport};
use tokio::sync::mpsc;
use tokio::time::timeout;

/// Lock store that is always unreachable
struct OfflineStore;

impl KeyValueStore<LockEntry> for OfflineStore {
    fn put(&self, _key: &str, _value: LockEntry) -> Result<()> {
        Err(TasklockError::StoreUnavailable("offline".into()))
    }

    fn put_if_absent(&self, _key: &str, _value: LockEntry) -> Result<bool> {
        Err(TasklockError::StoreUnavailable("offline".into()))
    }

    fn get(&self, _key: &str) -> Result<Option<LockEntry>> {
        Err(TasklockError::StoreUnavailable("offline".into()))
    }

    fn remove(&self, _key: &str) -> Result<Option<LockEntry>> {
        Err(TasklockError::StoreUnavailable("offline".into()))
    }

    fn keys(&self) -> Result<Vec<String>> {
        Err(TasklockError::StoreUnavailable("offline".into()))
    }
}

fn new_hub() -> Arc<BroadcastHub> {
    Arc::new(BroadcastHub::in_memory(&HubConfig::default()))
}

fn client(hub: &Arc<BroadcastHub>) -> ClientLockProxy {
    let transport = LocalTransport::new(Arc::clone(hub));
    ClientLockProxy::new(Arc::new(transport), ClientConfig::default())
}

async fn next(rx: &mut mpsc::UnboundedReceiver<LockEvent>) -> LockEvent {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for lock event")
        .expect("event stream closed")
}

#[tokio::test]
async fn test_begin_and_cancel_edit_reach_all_clients() {
    let hub = new_hub();
    let editor = client(&hub);
    let viewer = client(&hub);
    let mut editor_events = editor.subscribe();
    let mut viewer_events = viewer.subscribe();

    editor.connect().await.unwrap();
    viewer.connect().await.unwrap();
    for rx in [&mut editor_events, &mut viewer_events] {
        assert_eq!(next(rx).await, LockEvent::LockSnapshotReceived(BTreeSet::new()));
    }

    editor.request_begin_edit(RecordId(1)).await.unwrap();
    // The requester learns about its own lock through the broadcast
    for rx in [&mut editor_events, &mut viewer_events] {
        assert_eq!(next(rx).await, LockEvent::TaskLocked(RecordId(1)));
    }
    assert!(hub.lock_manager().is_locked(RecordId(1)).unwrap());

    editor.request_cancel_edit(RecordId(1)).await.unwrap();
    for rx in [&mut editor_events, &mut viewer_events] {
        assert_eq!(next(rx).await, LockEvent::TaskUnlocked(RecordId(1)));
    }
    assert!(!hub.lock_manager().is_locked(RecordId(1)).unwrap());
}

#[tokio::test]
async fn test_second_editor_is_acknowledged_without_broadcast() {
    let hub = new_hub();
    let first = client(&hub);
    let second = client(&hub);
    let mut events = second.subscribe();

    first.connect().await.unwrap();
    second.connect().await.unwrap();
    next(&mut events).await;

    first.request_begin_edit(RecordId(8)).await.unwrap();
    assert_eq!(next(&mut events).await, LockEvent::TaskLocked(RecordId(8)));

    // Already locked: acknowledged, nothing changes, nothing is broadcast
    second.request_begin_edit(RecordId(8)).await.unwrap();
    second.request_cancel_edit(RecordId(8)).await.unwrap();
    assert_eq!(next(&mut events).await, LockEvent::TaskUnlocked(RecordId(8)));
}

#[tokio::test]
async fn test_reconnect_receives_fresh_snapshot() {
    let hub = new_hub();
    let proxy = client(&hub);
    let mut events = proxy.subscribe();
    let mut changes = proxy.connection_changes();

    proxy.connect().await.unwrap();
    next(&mut events).await;
    proxy.request_begin_edit(RecordId(3)).await.unwrap();
    proxy.request_begin_edit(RecordId(9)).await.unwrap();
    next(&mut events).await;
    next(&mut events).await;

    proxy.disconnect();
    assert_eq!(proxy.connection_state(), ConnectionState::Disconnected);

    // Locks survive the disconnect
    let mut expected = BTreeSet::new();
    expected.insert(RecordId(3));
    expected.insert(RecordId(9));

    proxy.connect().await.unwrap();
    assert_eq!(
        next(&mut events).await,
        LockEvent::LockSnapshotReceived(expected)
    );

    let mut initial_connects = 0;
    while let Ok(change) = changes.try_recv() {
        if change.is_initial_connect() {
            initial_connects += 1;
        }
    }
    assert_eq!(initial_connects, 2);
}

#[tokio::test]
async fn test_requests_fail_while_disconnected() {
    let hub = new_hub();
    let proxy = client(&hub);

    let err = proxy.request_begin_edit(RecordId(1)).await.unwrap_err();
    assert!(matches!(err, ClientError::NotConnected(ConnectionState::Disconnected)));
    assert!(!hub.lock_manager().is_locked(RecordId(1)).unwrap());
}

#[tokio::test]
async fn test_hub_drops_session_on_client_disconnect() {
    let hub = new_hub();
    let proxy = client(&hub);
    let mut events = proxy.subscribe();
    proxy.connect().await.unwrap();

    // The snapshot arrives once the session registered the subscriber
    next(&mut events).await;
    assert_eq!(hub.subscriber_count(), 1);

    proxy.disconnect();
    for _ in 0..50 {
        if hub.subscriber_count() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(hub.subscriber_count(), 0);
}

#[tokio::test]
async fn test_connect_fails_when_hub_refuses_session() {
    let hub = Arc::new(BroadcastHub::new(
        LockManager::new(Arc::new(OfflineStore)),
        &HubConfig::default(),
    ));
    let proxy = client(&hub);

    let err = proxy.connect().await.unwrap_err();
    assert!(matches!(err, ClientError::Connect(_)));
    assert_eq!(proxy.connection_state(), ConnectionState::Disconnected);
    assert_eq!(hub.subscriber_count(), 0);

    let err = proxy.request_begin_edit(RecordId(1)).await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::NotConnected(ConnectionState::Disconnected)
    ));
}
