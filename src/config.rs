//! Configuration Module
//!
//! Construction parameters for a cache. Loading them (files, environment,
//! flags) is left to the surrounding application; the struct derives serde
//! so it can be embedded in whatever configuration format that uses.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Cache construction parameters.
///
/// A zero `default_ttl_ms` means entries written with the default
/// expiration never expire. A zero `cleanup_interval_ms` disables the
/// background sweeper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Default TTL in milliseconds for entries written with the default expiration
    pub default_ttl_ms: u64,
    /// Background sweep interval in milliseconds
    pub cleanup_interval_ms: u64,
}

impl CacheConfig {
    /// Creates a config from durations, truncated to whole milliseconds.
    pub fn new(default_ttl: Duration, cleanup_interval: Duration) -> Self {
        Self {
            default_ttl_ms: default_ttl.as_millis() as u64,
            cleanup_interval_ms: cleanup_interval.as_millis() as u64,
        }
    }

    /// Default TTL as a [`Duration`]
    pub fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.default_ttl_ms)
    }

    /// Sweep interval as a [`Duration`]
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval_ms)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_ms: 300_000,
            cleanup_interval_ms: 60_000,
        }
    }
}
