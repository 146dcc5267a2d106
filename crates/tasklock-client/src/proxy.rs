//! Client lock proxy
//!
//! Sends lock and unlock requests to the hub and republishes the hub's
//! events to local observers.
//!
//! A request completes when the hub acknowledges it. Whether the lock was
//! actually granted is learned asynchronously from the `TaskLocked` broadcast,
//! which the requester receives like every other client. The proxy keeps no
//! lock state of its own.
//!
//! # Example
//!
//! ```ignore
//! let proxy = ClientLockProxy::new(Arc::new(transport), ClientConfig::default());
//! let mut events = proxy.subscribe();
//!
//! proxy.connect().await?;
//! // First event of every session is the lock snapshot
//! let snapshot = events.recv().await;
//!
//! proxy.request_begin_edit(RecordId(1)).await?;
//! ```

use crate::connection::{ConnectionState, ConnectionStateTracker, StateChange};
use crate::error::{ClientError, Result};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tasklock_core::{
    ClientConfig, ClientMessage, HubTransport, Link, LinkSignal, LockEvent, RecordId, RequestId,
    ServerMessage, TasklockError,
};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Outcome the hub reported for one request
type Reply = std::result::Result<(), String>;

type PendingReplies = Arc<DashMap<RequestId, oneshot::Sender<Reply>>>;

/// Local observers of lock events
#[derive(Default)]
struct EventObservers {
    senders: Mutex<Vec<mpsc::UnboundedSender<LockEvent>>>,
}

impl EventObservers {
    fn subscribe(&self) -> mpsc::UnboundedReceiver<LockEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.lock().push(tx);
        rx
    }

    fn publish(&self, event: LockEvent) {
        self.senders
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// The currently open link and its background tasks
struct ActiveLink {
    epoch: u64,
    requests: mpsc::UnboundedSender<ClientMessage>,
    pending: PendingReplies,
    tasks: Vec<JoinHandle<()>>,
}

impl ActiveLink {
    fn shut_down(self) {
        for task in &self.tasks {
            task.abort();
        }
        // Dropping the senders fails every waiting request
        self.pending.clear();
    }
}

struct Inner {
    tracker: ConnectionStateTracker,
    observers: EventObservers,
    active: Mutex<Option<ActiveLink>>,
}

impl Inner {
    fn is_current(active: &Option<ActiveLink>, epoch: u64) -> bool {
        active.as_ref().map(|link| link.epoch) == Some(epoch)
    }

    /// Apply a signal raised by the link of `epoch`, if it is still current.
    ///
    /// `Closed` retires the link: its tasks are aborted and its pending
    /// requests fail, even if the transport left the message stream open.
    fn link_signal(&self, epoch: u64, signal: LinkSignal) {
        let mut active = self.active.lock();
        if !Self::is_current(&active, epoch) {
            return;
        }
        if signal == LinkSignal::Closed {
            if let Some(link) = active.take() {
                link.shut_down();
            }
            tracing::info!("Connection to the hub closed");
        }
        self.tracker.observe(signal);
    }

    /// Publish `event` only while the link of `epoch` is current.
    fn publish_from(&self, epoch: u64, event: LockEvent) -> bool {
        let active = self.active.lock();
        if !Self::is_current(&active, epoch) {
            return false;
        }
        self.observers.publish(event);
        true
    }
}

/// Client side of the real-time lock channel
pub struct ClientLockProxy {
    transport: Arc<dyn HubTransport>,
    config: ClientConfig,
    inner: Arc<Inner>,
    next_request_id: AtomicU64,
    next_epoch: AtomicU64,
}

impl ClientLockProxy {
    pub fn new(transport: Arc<dyn HubTransport>, config: ClientConfig) -> Self {
        Self {
            transport,
            config,
            inner: Arc::new(Inner {
                tracker: ConnectionStateTracker::new(),
                observers: EventObservers::default(),
                active: Mutex::new(None),
            }),
            next_request_id: AtomicU64::new(1),
            next_epoch: AtomicU64::new(1),
        }
    }

    /// Open a session with the hub.
    ///
    /// Runs the initial connect sequence `Disconnected → Connecting →
    /// Connected`. The state only becomes `Connected` once the hub registered
    /// the session, which it signals with the lock snapshot (delivered to
    /// observers as [`LockEvent::LockSnapshotReceived`]). If the link closes
    /// before that, or the snapshot does not arrive within the request
    /// timeout, the state returns to `Disconnected` and
    /// [`ClientError::Connect`] is returned.
    ///
    /// Calling this while already connecting or connected does nothing.
    pub async fn connect(&self) -> Result<()> {
        if self.inner.tracker.observe(LinkSignal::Connecting).is_none() {
            tracing::debug!(
                "Connect skipped, connection is {:?}",
                self.inner.tracker.state()
            );
            return Ok(());
        }

        let link = match self.transport.open().await {
            Ok(link) => link,
            Err(e) => {
                tracing::warn!("Failed to connect to the hub: {}", e);
                self.inner.tracker.observe(LinkSignal::Closed);
                return Err(ClientError::Connect(e));
            }
        };

        let epoch = self.next_epoch.fetch_add(1, Ordering::Relaxed);
        let Link {
            requests,
            messages,
            signals,
        } = link;
        let pending: PendingReplies = Arc::new(DashMap::new());
        let (registered_tx, registered_rx) = oneshot::channel();

        {
            let mut active = self.inner.active.lock();
            let tasks = vec![
                tokio::spawn(dispatch_messages(
                    Arc::clone(&self.inner),
                    epoch,
                    messages,
                    Arc::clone(&pending),
                    registered_tx,
                )),
                tokio::spawn(pump_signals(Arc::clone(&self.inner), epoch, signals)),
            ];
            *active = Some(ActiveLink {
                epoch,
                requests,
                pending,
                tasks,
            });
        }

        let failure = match tokio::time::timeout(self.config.request_timeout(), registered_rx).await
        {
            Ok(Ok(())) => None,
            Ok(Err(_)) => Some("link closed before the hub registered the client"),
            Err(_) => Some("hub did not send the lock snapshot in time"),
        };

        let mut active = self.inner.active.lock();
        let reason = match failure {
            None if Inner::is_current(&active, epoch) => {
                self.inner.tracker.observe(LinkSignal::Connected);
                tracing::info!("Connected to the hub");
                return Ok(());
            }
            None => "link closed before the hub registered the client",
            Some(reason) => reason,
        };

        if Inner::is_current(&active, epoch) {
            if let Some(link) = active.take() {
                link.shut_down();
            }
            self.inner.tracker.observe(LinkSignal::Closed);
        }
        tracing::warn!("Failed to connect to the hub: {}", reason);
        Err(ClientError::Connect(TasklockError::Transport(reason.into())))
    }

    /// Close the session. Pending requests fail with a transport error.
    pub fn disconnect(&self) {
        let link = self.inner.active.lock().take();
        if let Some(link) = link {
            link.shut_down();
            self.inner.tracker.observe(LinkSignal::Closed);
            tracing::info!("Disconnected from the hub");
        }
    }

    /// Ask the hub to lock `record_id` for editing.
    ///
    /// Returns once the hub acknowledged the request.
    pub async fn request_begin_edit(&self, record_id: RecordId) -> Result<()> {
        self.request("begin edit", record_id, |request_id, record_id| {
            ClientMessage::BeginUpdate {
                request_id,
                record_id,
            }
        })
        .await
    }

    /// Ask the hub to unlock `record_id`.
    pub async fn request_cancel_edit(&self, record_id: RecordId) -> Result<()> {
        self.request("cancel edit", record_id, |request_id, record_id| {
            ClientMessage::CancelUpdate {
                request_id,
                record_id,
            }
        })
        .await
    }

    /// Stream of lock events from now on, in the order the hub sent them.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<LockEvent> {
        self.inner.observers.subscribe()
    }

    /// Stream of connection state transitions from now on.
    pub fn connection_changes(&self) -> mpsc::UnboundedReceiver<StateChange> {
        self.inner.tracker.subscribe()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.inner.tracker.state()
    }

    async fn request(
        &self,
        op: &'static str,
        record_id: RecordId,
        build: impl FnOnce(RequestId, RecordId) -> ClientMessage,
    ) -> Result<()> {
        let state = self.inner.tracker.state();
        if state != ConnectionState::Connected {
            return Err(ClientError::NotConnected(state));
        }

        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let (reply_tx, reply_rx) = oneshot::channel();

        let pending = {
            let active = self.inner.active.lock();
            let link = active
                .as_ref()
                .ok_or(ClientError::NotConnected(ConnectionState::Disconnected))?;

            link.pending.insert(request_id, reply_tx);
            if link.requests.send(build(request_id, record_id)).is_err() {
                link.pending.remove(&request_id);
                return Err(ClientError::Transport {
                    op,
                    record_id,
                    reason: "link closed before the request was sent".into(),
                });
            }
            Arc::clone(&link.pending)
        };

        tracing::debug!("Sent request {} ({} record {})", request_id, op, record_id);

        match tokio::time::timeout(self.config.request_timeout(), reply_rx).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(message))) => {
                tracing::warn!("Hub rejected {} of record {}", op, record_id);
                Err(ClientError::Rejected(message))
            }
            Ok(Err(_)) => Err(ClientError::Transport {
                op,
                record_id,
                reason: "link closed before the hub replied".into(),
            }),
            Err(_) => {
                pending.remove(&request_id);
                Err(ClientError::Timeout {
                    request_id,
                    timeout_ms: self.config.request_timeout_ms,
                })
            }
        }
    }
}

impl Drop for ClientLockProxy {
    fn drop(&mut self) {
        if let Some(link) = self.inner.active.lock().take() {
            link.shut_down();
        }
    }
}

/// Route replies to their waiting requests and events to observers.
///
/// The first snapshot completes `registered`. Events are dropped once the
/// link of `epoch` has been retired.
async fn dispatch_messages(
    inner: Arc<Inner>,
    epoch: u64,
    mut messages: mpsc::UnboundedReceiver<ServerMessage>,
    pending: PendingReplies,
    registered: oneshot::Sender<()>,
) {
    let mut registered = Some(registered);

    while let Some(message) = messages.recv().await {
        match message {
            ServerMessage::Ack { request_id } => complete(&pending, request_id, Ok(())),
            ServerMessage::Rejected {
                request_id,
                message,
            } => complete(&pending, request_id, Err(message)),
            other => {
                let is_snapshot = matches!(other, ServerMessage::SendLockedTasksOnConnect(_));
                let Some(event) = other.into_event() else {
                    continue;
                };
                if !inner.publish_from(epoch, event) {
                    tracing::debug!("Dropping event from retired link {}", epoch);
                    break;
                }
                if is_snapshot {
                    if let Some(tx) = registered.take() {
                        let _ = tx.send(());
                    }
                }
            }
        }
    }
    inner.link_signal(epoch, LinkSignal::Closed);
}

fn complete(pending: &PendingReplies, request_id: RequestId, reply: Reply) {
    match pending.remove(&request_id) {
        Some((_, tx)) => {
            let _ = tx.send(reply);
        }
        None => tracing::debug!("Reply for unknown or expired request {}", request_id),
    }
}

async fn pump_signals(
    inner: Arc<Inner>,
    epoch: u64,
    mut signals: mpsc::UnboundedReceiver<LinkSignal>,
) {
    while let Some(signal) = signals.recv().await {
        inner.link_signal(epoch, signal);
        if signal == LinkSignal::Closed {
            break;
        }
    }
}
