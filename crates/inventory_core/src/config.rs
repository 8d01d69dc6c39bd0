//! Sync engine configuration.
//!
//! # Responsibility
//! - Describe the resource bounds of the engine's background work.
//! - Parse configuration documents supplied by the host application.
//!
//! # Invariants
//! - Every field has a default; a missing document means `SyncConfig::default()`.
//! - `validate()` rejects values that would disable a bounded resource.

use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Resource bounds and timings for `SyncEngine`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Number of outbound worker lanes (max concurrent remote writes).
    pub outbound_workers: usize,
    /// Pending mutations each lane may queue before callers wait.
    pub outbound_queue_capacity: usize,
    /// Delay before resubscribing after the remote feed fails or ends.
    pub resubscribe_backoff_ms: u64,
    /// How long shutdown waits for queued mutations to drain.
    pub shutdown_drain_timeout_ms: u64,
    /// Buffered `SyncEvent`s per subscriber before the oldest are dropped.
    pub event_channel_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            outbound_workers: 4,
            outbound_queue_capacity: 256,
            resubscribe_backoff_ms: 1_000,
            shutdown_drain_timeout_ms: 5_000,
            event_channel_capacity: 128,
        }
    }
}

/// Invalid configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Parse(String),
    ZeroValue(&'static str),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(message) => write!(f, "invalid sync config: {message}"),
            Self::ZeroValue(field) => write!(f, "sync config `{field}` must be greater than 0"),
        }
    }
}

impl Error for ConfigError {}

impl SyncConfig {
    /// Parses a JSON document; absent fields keep their defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(raw).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.outbound_workers == 0 {
            return Err(ConfigError::ZeroValue("outbound_workers"));
        }
        if self.outbound_queue_capacity == 0 {
            return Err(ConfigError::ZeroValue("outbound_queue_capacity"));
        }
        if self.event_channel_capacity == 0 {
            return Err(ConfigError::ZeroValue("event_channel_capacity"));
        }
        if self.resubscribe_backoff_ms == 0 {
            return Err(ConfigError::ZeroValue("resubscribe_backoff_ms"));
        }
        Ok(())
    }

    pub fn resubscribe_backoff(&self) -> Duration {
        Duration::from_millis(self.resubscribe_backoff_ms)
    }

    pub fn shutdown_drain_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_drain_timeout_ms)
    }
}
