//! Run configuration
//!
//! Measurement knobs shared by every round: output device selection,
//! polling granularity, the maximum-wait margin bounding the position
//! waits, and parser strictness. Stored as JSON with serde defaults so a
//! partial config file still loads.

use crate::DEFAULT_POLL_INTERVAL_MS;
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_max_wait_margin_secs() -> u64 {
    5
}

/// Run configuration for a test plan execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Output device name (None = default output device)
    #[serde(default)]
    pub device: Option<String>,
    /// Position polling interval in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Slack added to the expected duration when bounding position waits
    #[serde(default = "default_max_wait_margin_secs")]
    pub max_wait_margin_secs: u64,
    /// Honor RIFF odd-chunk padding while parsing
    #[serde(default)]
    pub pad_odd_chunks: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            device: None,
            poll_interval_ms: default_poll_interval_ms(),
            max_wait_margin_secs: default_max_wait_margin_secs(),
            pad_odd_chunks: false,
        }
    }
}

impl RunConfig {
    /// Load config from disk, falling back to defaults on any error
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    tracing::info!(path = %path.display(), "Loaded config from disk");
                    config
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to parse config, using defaults");
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!(path = %path.display(), "No config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Save config to disk, creating parent directories if needed
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        tracing::info!(path = %path.display(), "Config saved to disk");
        Ok(())
    }
}
