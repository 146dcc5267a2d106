pub mod client;
pub mod hub;

pub use client::ClientConfig;
pub use hub::HubConfig;

use crate::error::{Result, TasklockError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration shared by the hub and its clients
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TasklockConfig {
    #[serde(default)]
    pub hub: HubConfig,

    #[serde(default)]
    pub client: ClientConfig,
}

impl TasklockConfig {
    /// Load configuration from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.hub.stripe_count == 0 {
            return Err(TasklockError::Config(
                "hub.stripe_count must be positive".into(),
            ));
        }
        if self.hub.gate_timeout_ms == 0 {
            return Err(TasklockError::Config(
                "hub.gate_timeout_ms must be positive".into(),
            ));
        }
        if self.client.request_timeout_ms == 0 {
            return Err(TasklockError::Config(
                "client.request_timeout_ms must be positive".into(),
            ));
        }
        Ok(())
    }
}
