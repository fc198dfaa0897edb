//! Slot Cache - fixed-capacity, index-addressed in-process caches
//!
//! Provides slot caches for byte buffers and typed values, plus a background
//! sweeper that keeps every registered cache within its memory budget through
//! graduated age-based eviction.

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod registry;
pub mod tasks;

pub use cache::{ByteCache, CacheStats, SlotCache, SlotCacheBuilder};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, SweeperConfig};
pub use error::{CacheError, Result};
pub use registry::{CacheId, Evictable, Registry};
pub use tasks::{purge_graduated, sweep_once, PurgeOutcome, SweepReport, Sweeper};
