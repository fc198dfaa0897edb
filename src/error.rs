//! Error types for the slot cache
//!
//! Slot operations never fail; these errors cover configuration and the
//! sweeper lifecycle only.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for configuration and background task management.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Configuration value rejected by validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// `start` called on a sweeper that is already running
    #[error("Sweeper is already running")]
    SweeperRunning,

    /// `stop` called on a sweeper that was never started
    #[error("Sweeper is not running")]
    SweeperNotRunning,

    /// Sweeper started outside of a Tokio runtime
    #[error("No async runtime available: {0}")]
    NoRuntime(String),

    /// Sweep task panicked or was cancelled before shutting down
    #[error("Sweep task failed: {0}")]
    TaskFailed(String),
}

// == Result Type Alias ==
/// Convenience Result type for the slot cache.
pub type Result<T> = std::result::Result<T, CacheError>;
