use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a record in the shared collection.
///
/// Identifiers are non-negative integers and travel over the wire as bare
/// numbers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl RecordId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for RecordId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>().map(Self)
    }
}

/// Value stored for a locked record.
///
/// Presence of the entry is the lock; the fields are informational only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockEntry {
    /// Record this entry locks
    pub record_id: RecordId,

    /// When the lock was first taken
    pub locked_at: DateTime<Utc>,
}

impl LockEntry {
    pub fn new(record_id: RecordId) -> Self {
        Self {
            record_id,
            locked_at: Utc::now(),
        }
    }
}
