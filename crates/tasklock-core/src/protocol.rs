//! Messages exchanged over the real-time channel.
//!
//! Every message serializes as a JSON object of the form
//! `{"method": <name>, "payload": <value>}` so that any ordered byte
//! transport can carry it.
//!
//! | Direction | Method | Payload |
//! |---|---|---|
//! | client → server | `BeginUpdate` | `{requestId, recordId}` |
//! | client → server | `CancelUpdate` | `{requestId, recordId}` |
//! | server → caller | `Ack` | `{requestId}` |
//! | server → caller | `Rejected` | `{requestId, message}` |
//! | server → caller | `SendLockedTasksOnConnect` | `[recordId, ...]` |
//! | server → all | `TaskLocked` | `recordId` |
//! | server → all | `TaskUnlocked` | `recordId` |

use crate::types::RecordId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Correlates a client request with the server's acknowledgement.
pub type RequestId = u64;

/// Requests sent from a client to the hub
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "payload", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Ask for `record_id` to be locked
    BeginUpdate {
        request_id: RequestId,
        record_id: RecordId,
    },

    /// Ask for `record_id` to be unlocked
    CancelUpdate {
        request_id: RequestId,
        record_id: RecordId,
    },
}

impl ClientMessage {
    pub fn request_id(&self) -> RequestId {
        match self {
            Self::BeginUpdate { request_id, .. } | Self::CancelUpdate { request_id, .. } => {
                *request_id
            }
        }
    }

    pub fn record_id(&self) -> RecordId {
        match self {
            Self::BeginUpdate { record_id, .. } | Self::CancelUpdate { record_id, .. } => {
                *record_id
            }
        }
    }
}

/// Messages pushed from the hub to a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "payload", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// The request was received and processed
    Ack { request_id: RequestId },

    /// The request failed on the server. The message is generic on purpose.
    Rejected {
        request_id: RequestId,
        message: String,
    },

    /// Full set of locked records, sent once to a newly connected client
    SendLockedTasksOnConnect(BTreeSet<RecordId>),

    /// A record was locked
    TaskLocked(RecordId),

    /// A record was unlocked
    TaskUnlocked(RecordId),
}

impl ServerMessage {
    /// The lock event carried by this message, if it is not a reply.
    pub fn into_event(self) -> Option<LockEvent> {
        match self {
            Self::SendLockedTasksOnConnect(ids) => Some(LockEvent::LockSnapshotReceived(ids)),
            Self::TaskLocked(id) => Some(LockEvent::TaskLocked(id)),
            Self::TaskUnlocked(id) => Some(LockEvent::TaskUnlocked(id)),
            Self::Ack { .. } | Self::Rejected { .. } => None,
        }
    }
}

/// Lock state change observed by a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockEvent {
    TaskLocked(RecordId),
    TaskUnlocked(RecordId),
    LockSnapshotReceived(BTreeSet<RecordId>),
}

impl From<LockEvent> for ServerMessage {
    fn from(event: LockEvent) -> Self {
        match event {
            LockEvent::TaskLocked(id) => Self::TaskLocked(id),
            LockEvent::TaskUnlocked(id) => Self::TaskUnlocked(id),
            LockEvent::LockSnapshotReceived(ids) => Self::SendLockedTasksOnConnect(ids),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_message_wire_shape() {
        let msg = ClientMessage::BeginUpdate {
            request_id: 3,
            record_id: RecordId(17),
        };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"method": "BeginUpdate", "payload": {"requestId": 3, "recordId": 17}})
        );
        assert_eq!(msg.request_id(), 3);
        assert_eq!(msg.record_id(), RecordId(17));
    }

    #[test]
    fn test_snapshot_wire_shape() {
        let raw = r#"{"method":"SendLockedTasksOnConnect","payload":[9,3]}"#;
        let msg: ServerMessage = serde_json::from_str(raw).unwrap();

        let expected: BTreeSet<RecordId> = [RecordId(3), RecordId(9)].into_iter().collect();
        assert_eq!(
            msg.into_event(),
            Some(LockEvent::LockSnapshotReceived(expected))
        );
    }

    #[test]
    fn test_replies_are_not_events() {
        let ack: ServerMessage =
            serde_json::from_value(json!({"method": "Ack", "payload": {"requestId": 1}})).unwrap();
        assert_eq!(ack, ServerMessage::Ack { request_id: 1 });
        assert_eq!(ack.into_event(), None);

        let locked = ServerMessage::from(LockEvent::TaskLocked(RecordId(4)));
        assert_eq!(
            serde_json::to_value(&locked).unwrap(),
            json!({"method": "TaskLocked", "payload": 4})
        );
    }
}
