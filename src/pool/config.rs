//! Resource pool configuration.

use crate::core::result::duration_serde;

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a [`ResourcePool`](crate::pool::ResourcePool).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Consecutive failures before a resource is quarantined.
    pub quarantine_threshold: u32,

    /// How long a quarantined resource is kept out of rotation.
    #[serde(with = "duration_serde", rename = "quarantine_duration_ms")]
    pub quarantine_duration: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            quarantine_threshold: 3,
            quarantine_duration: Duration::from_secs(300),
        }
    }
}

impl PoolConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the quarantine threshold. Values below 1 are raised to 1.
    pub fn with_quarantine_threshold(mut self, threshold: u32) -> Self {
        self.quarantine_threshold = threshold.max(1);
        self
    }

    /// Sets the quarantine duration.
    pub fn with_quarantine_duration(mut self, duration: Duration) -> Self {
        self.quarantine_duration = duration;
        self
    }

    /// Creates a configuration for small pools of paid credentials.
    ///
    /// Tolerates more consecutive failures and keeps quarantines short, so a
    /// handful of keys is not taken out of rotation by one bad upstream.
    pub fn lenient() -> Self {
        Self {
            quarantine_threshold: 5,
            quarantine_duration: Duration::from_secs(60),
        }
    }

    /// Creates a configuration for large pools of cheap proxies.
    ///
    /// Quarantines after two consecutive failures for fifteen minutes.
    pub fn strict() -> Self {
        Self {
            quarantine_threshold: 2,
            quarantine_duration: Duration::from_secs(900),
        }
    }
}
