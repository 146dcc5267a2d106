//! Connection state tracking for the client side of the lock channel.
//!
//! ```text
//! Disconnected ──Connecting──▶ Connecting ──Connected──▶ Connected
//!      ▲                           │                       │   ▲
//!      │                         Closed               Interrupted │
//!      │                           │                       ▼   │ Resumed
//!      └───────────Closed──────────┴────────────────── Reconnecting
//! ```
//!
//! The tracker is driven only by [`LinkSignal`]s from the transport. Business
//! logic reads the state and listens for [`StateChange`]s; it cannot set the
//! state.

use parking_lot::Mutex;
use tasklock_core::LinkSignal;
use tokio::sync::mpsc;

/// State of the connection to the hub
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// One transition of the connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    pub previous: ConnectionState,
    pub current: ConnectionState,
}

impl StateChange {
    /// True for `Connecting → Connected`: a fresh session was created and the
    /// hub pushed a new lock snapshot. A resumed connection
    /// (`Reconnecting → Connected`) is not an initial connect.
    pub fn is_initial_connect(&self) -> bool {
        self.previous == ConnectionState::Connecting && self.current == ConnectionState::Connected
    }
}

struct TrackerState {
    state: ConnectionState,
    observers: Vec<mpsc::UnboundedSender<StateChange>>,
}

/// Finite state machine over the transport's lifecycle signals
pub struct ConnectionStateTracker {
    inner: Mutex<TrackerState>,
}

impl ConnectionStateTracker {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(TrackerState {
                state: ConnectionState::Disconnected,
                observers: Vec::new(),
            }),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Stream of every transition from now on, in order.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<StateChange> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.lock().observers.push(tx);
        rx
    }

    /// Apply a lifecycle signal.
    ///
    /// Returns the transition it caused, or `None` if the signal does not
    /// apply to the current state (it is then ignored).
    pub(crate) fn observe(&self, signal: LinkSignal) -> Option<StateChange> {
        use ConnectionState::*;

        let mut inner = self.inner.lock();
        let previous = inner.state;
        let current = match (previous, signal) {
            (Disconnected, LinkSignal::Connecting) => Connecting,
            (Connecting, LinkSignal::Connected) => Connected,
            (Connected, LinkSignal::Interrupted) => Reconnecting,
            (Reconnecting, LinkSignal::Resumed) => Connected,
            (Connecting | Connected | Reconnecting, LinkSignal::Closed) => Disconnected,
            _ => {
                tracing::warn!("Ignoring {:?} signal while {:?}", signal, previous);
                return None;
            }
        };

        inner.state = current;
        let change = StateChange { previous, current };
        // Notified under the lock so observers see transitions in order
        inner.observers.retain(|tx| tx.send(change).is_ok());
        tracing::debug!("Connection state {:?} -> {:?}", previous, current);
        Some(change)
    }
}

impl Default for ConnectionStateTracker {
    fn default() -> Self {
        Self::new()
    }
}
