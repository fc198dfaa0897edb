//! Configuration Module
//!
//! Handles loading sweeper and cache sizing parameters from environment variables.

use std::env;
use std::time::Duration;

use crate::error::{CacheError, Result};

/// Default seconds between sweeps.
pub const DEFAULT_SWEEP_INTERVAL: u64 = 60;

/// Process configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Seconds between background sweeps
    pub sweep_interval: u64,
    /// Number of slots for caches built from this config
    pub cache_slots: usize,
    /// Memory budget in megabytes for caches built from this config
    pub cache_budget_mb: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SWEEP_INTERVAL` - Seconds between sweeps (default: 60)
    /// - `CACHE_SLOTS` - Slots per cache (default: 1024)
    /// - `CACHE_BUDGET_MB` - Budget per cache in megabytes (default: 64)
    pub fn from_env() -> Self {
        Self {
            sweep_interval: env::var("SWEEP_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_SWEEP_INTERVAL),
            cache_slots: env::var("CACHE_SLOTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1024),
            cache_budget_mb: env::var("CACHE_BUDGET_MB")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(64),
        }
    }

    /// Rejects values the sweeper cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.sweep_interval == 0 {
            return Err(CacheError::InvalidConfig(
                "SWEEP_INTERVAL must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            cache_slots: 1024,
            cache_budget_mb: 64,
        }
    }
}

// == Sweeper Config ==
/// Settings for the background sweeper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweeperConfig {
    /// Time between two sweeps
    pub interval: Duration,
}

impl SweeperConfig {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(CacheError::InvalidConfig(
                "sweep interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_SWEEP_INTERVAL))
    }
}

impl From<&Config> for SweeperConfig {
    fn from(config: &Config) -> Self {
        Self::new(Duration::from_secs(config.sweep_interval))
    }
}
