//! Cache Module
//!
//! Provides fixed-capacity slot caches with per-slot locking and approximate
//! memory accounting.

mod entry;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use entry::Entry;
pub use stats::CacheStats;
pub use store::{ByteCache, SlotCache, SlotCacheBuilder, Sizer};

// == Public Constants ==
/// Bytes in a megabyte, as used for budgets given in megabytes
pub const MEGABYTE: u64 = 1024 * 1024;
