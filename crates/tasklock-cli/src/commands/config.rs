//! Config command implementation

use anyhow::{Context, Result};
use tasklock_core::TasklockConfig;

pub fn execute(config: &TasklockConfig) -> Result<()> {
    let rendered =
        serde_json::to_string_pretty(config).context("Failed to serialize configuration")?;
    println!("{}", rendered);
    Ok(())
}
