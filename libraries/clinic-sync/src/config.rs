//! Sync configuration
//!
//! Durations are stored in milliseconds so the struct reads naturally from
//! TOML and environment variables.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timers and limits for the queue manager and sync engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Periodic sync pass cadence while online
    pub sync_interval_ms: u64,
    /// Cadence of the cached status refresh for polling consumers
    pub status_refresh_interval_ms: u64,
    /// How long connectivity must stay up before an online event fires
    pub connectivity_debounce_ms: u64,
    /// Upper bound on a single remote call
    pub request_timeout_ms: u64,
    /// Reachability probe cadence; `None` disables the probe
    pub probe_interval_ms: Option<u64>,
    pub retry: RetryConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            sync_interval_ms: 30_000,
            status_refresh_interval_ms: 5_000,
            connectivity_debounce_ms: 3_000,
            request_timeout_ms: 30_000,
            probe_interval_ms: Some(15_000),
            retry: RetryConfig::default(),
        }
    }
}

impl SyncConfig {
    pub fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.sync_interval_ms)
    }

    pub fn status_refresh_interval(&self) -> Duration {
        Duration::from_millis(self.status_refresh_interval_ms)
    }

    pub fn connectivity_debounce(&self) -> Duration {
        Duration::from_millis(self.connectivity_debounce_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn probe_interval(&self) -> Option<Duration> {
        self.probe_interval_ms.map(Duration::from_millis)
    }

    /// Reject settings that would spin the timers or never retry sanely
    pub fn validate(&self) -> Result<(), String> {
        if self.sync_interval_ms == 0 {
            return Err("sync_interval_ms must be greater than zero".into());
        }
        if self.status_refresh_interval_ms == 0 {
            return Err("status_refresh_interval_ms must be greater than zero".into());
        }
        if self.request_timeout_ms == 0 {
            return Err("request_timeout_ms must be greater than zero".into());
        }
        if self.probe_interval_ms == Some(0) {
            return Err("probe_interval_ms must be greater than zero when set".into());
        }
        if self.retry.max_retries == 0 {
            return Err("retry.max_retries must be at least 1".into());
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err("retry.base_delay_ms must not exceed retry.max_delay_ms".into());
        }
        Ok(())
    }
}

/// Exponential backoff settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Consecutive transient failures after which an item fails for good
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 2_000,
            max_delay_ms: 300_000,
        }
    }
}
