use crate::types::RecordId;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TasklockError {
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Failed to {op} record {record_id}: {source}")]
    Lock {
        op: &'static str,
        record_id: RecordId,
        #[source]
        source: Box<TasklockError>,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl TasklockError {
    /// Wrap a store-level failure with the lock operation and record it hit.
    pub fn lock_failure(op: &'static str, record_id: RecordId, source: TasklockError) -> Self {
        Self::Lock {
            op,
            record_id,
            source: Box::new(source),
        }
    }

    /// True when the failure came from an unreachable store, directly or
    /// wrapped by a lock operation.
    pub fn is_store_unavailable(&self) -> bool {
        match self {
            Self::StoreUnavailable(_) => true,
            Self::Lock { source, .. } => source.is_store_unavailable(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, TasklockError>;
