//! Configuration for the tile cache.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the in-memory tile cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileCacheConfig {
    /// Whether tiles are cached at all. Can be toggled at runtime.
    pub enabled: bool,

    /// Maximum number of cached tiles.
    pub max_entries: usize,

    /// Memory budget for cached tiles in megabytes.
    pub max_size_mb: usize,

    /// Tiles older than this are dropped regardless of use.
    pub ttl_secs: u64,

    /// Interval between expiry sweeps. 0 disables the sweeper.
    pub sweep_interval_secs: u64,
}

impl Default for TileCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 10_000,
            max_size_mb: 512,
            ttl_secs: 86_400,
            sweep_interval_secs: 300,
        }
    }
}

impl TileCacheConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("TILE_CACHE_ENABLED") {
            config.enabled = val.to_lowercase() == "true" || val == "1";
        }

        if let Ok(val) = std::env::var("TILE_CACHE_MAX_ENTRIES") {
            if let Ok(n) = val.parse() {
                config.max_entries = n;
            }
        }

        if let Ok(val) = std::env::var("TILE_CACHE_MAX_SIZE_MB") {
            if let Ok(size) = val.parse() {
                config.max_size_mb = size;
            }
        }

        if let Ok(val) = std::env::var("TILE_CACHE_TTL_SECS") {
            if let Ok(secs) = val.parse() {
                config.ttl_secs = secs;
            }
        }

        if let Ok(val) = std::env::var("TILE_CACHE_SWEEP_INTERVAL_SECS") {
            if let Ok(secs) = val.parse() {
                config.sweep_interval_secs = secs;
            }
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_entries == 0 {
            return Err("max_entries must be > 0".to_string());
        }

        if self.max_size_mb == 0 {
            return Err("max_size_mb must be > 0".to_string());
        }

        if self.ttl_secs == 0 {
            return Err("ttl_secs must be > 0".to_string());
        }

        Ok(())
    }

    /// Get the memory budget in bytes.
    pub fn max_size_bytes(&self) -> u64 {
        (self.max_size_mb as u64) * 1024 * 1024
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Sweep interval, `None` if the sweeper is disabled.
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
    }
}
