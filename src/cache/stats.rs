//! Cache Statistics Module
//!
//! Point-in-time counters for a single slot cache.

use serde::Serialize;

// == Cache Stats ==
/// Snapshot of a cache's occupancy, memory and access counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Cache label
    pub label: String,
    /// Addressable slots (zero once closed)
    pub capacity: usize,
    /// Currently occupied slots
    pub occupied: usize,
    /// Approximate bytes held
    pub memory_bytes: u64,
    /// Memory budget in bytes
    pub budget_bytes: u64,
    /// Reads that found an entry
    pub hits: u64,
    /// Reads that found nothing or were out of range
    pub misses: u64,
    /// Entries removed by purges
    pub purged: u64,
    /// Whether the cache was closed
    pub closed: bool,
}

impl CacheStats {
    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no reads have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    // == Budget Usage ==
    /// Memory as a fraction of the budget; 0.0 for a zero budget.
    pub fn budget_usage(&self) -> f64 {
        if self.budget_bytes == 0 {
            0.0
        } else {
            self.memory_bytes as f64 / self.budget_bytes as f64
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate_no_requests() {
        let stats = CacheStats::default();
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let stats = CacheStats {
            hits: 3,
            misses: 1,
            ..CacheStats::default()
        };
        assert_eq!(stats.hit_rate(), 0.75);
    }

    #[test]
    fn test_budget_usage() {
        let stats = CacheStats {
            memory_bytes: 120,
            budget_bytes: 100,
            ..CacheStats::default()
        };
        assert_eq!(stats.budget_usage(), 1.2);
        assert_eq!(CacheStats::default().budget_usage(), 0.0);
    }

    #[test]
    fn test_stats_serialize() {
        let stats = CacheStats {
            label: "blobs".to_string(),
            capacity: 4,
            occupied: 2,
            memory_bytes: 120,
            budget_bytes: 100,
            ..CacheStats::default()
        };
        let json = serde_json::to_value(&stats).unwrap();

        assert_eq!(json["label"], "blobs");
        assert_eq!(json["memory_bytes"], 120);
        assert_eq!(json["closed"], false);
    }
}
