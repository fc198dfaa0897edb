//! Registry Module
//!
//! Tracks every live cache so a single sweeper can bound their memory.
//!
//! The registry holds weak references only: a cache dropped by its owner
//! disappears from the next snapshot, and a closed cache deregisters itself.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

/// Identifier handed out at registration.
pub type CacheId = u64;

// == Evictable ==
/// Type-erased view of a cache used by the sweeper.
pub trait Evictable: Send + Sync {
    /// Human readable name used in logs.
    fn label(&self) -> &str;

    /// Approximate bytes currently held.
    fn memory(&self) -> u64;

    /// Bytes the cache may hold before it becomes eviction-eligible.
    fn budget(&self) -> u64;

    /// Removes entries last accessed before `older_than` (unix seconds).
    /// Returns the number of entries removed.
    fn purge(&self, older_than: i64) -> usize;

    fn is_over_budget(&self) -> bool {
        self.memory() > self.budget()
    }
}

struct Registration {
    id: CacheId,
    cache: Weak<dyn Evictable>,
}

#[derive(Default)]
struct RegistryInner {
    caches: Mutex<Vec<Registration>>,
    next_id: AtomicU64,
}

// == Registry ==
/// Shared, cloneable handle to a set of registered caches.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a cache and returns the id to deregister it with.
    pub fn register(&self, cache: Weak<dyn Evictable>) -> CacheId {
        let id = self.allocate_id();
        self.register_with_id(id, cache);
        id
    }

    /// Reserves an id for a cache that registers itself once constructed.
    pub(crate) fn allocate_id(&self) -> CacheId {
        self.inner.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn register_with_id(&self, id: CacheId, cache: Weak<dyn Evictable>) {
        self.inner.caches.lock().push(Registration { id, cache });
    }

    /// Removes a cache. Returns false if the id was not registered.
    pub fn deregister(&self, id: CacheId) -> bool {
        let mut caches = self.inner.caches.lock();
        let before = caches.len();
        caches.retain(|registration| registration.id != id);
        caches.len() != before
    }

    /// Returns strong references to every live cache.
    ///
    /// The lock is released before the caller touches any cache, so a long
    /// sweep never blocks registration. Dead registrations are pruned here.
    pub fn snapshot(&self) -> Vec<Arc<dyn Evictable>> {
        let mut caches = self.inner.caches.lock();
        let mut live = Vec::with_capacity(caches.len());
        caches.retain(|registration| match registration.cache.upgrade() {
            Some(cache) => {
                live.push(cache);
                true
            }
            None => false,
        });
        live
    }

    /// Number of registrations, including ones not yet pruned.
    pub fn len(&self) -> usize {
        self.inner.caches.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("registered", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct FakeCache {
        memory: AtomicU64,
        budget: u64,
        purges: AtomicUsize,
    }

    impl FakeCache {
        fn new(memory: u64, budget: u64) -> Arc<Self> {
            Arc::new(Self {
                memory: AtomicU64::new(memory),
                budget,
                purges: AtomicUsize::new(0),
            })
        }
    }

    impl Evictable for FakeCache {
        fn label(&self) -> &str {
            "fake"
        }

        fn memory(&self) -> u64 {
            self.memory.load(Ordering::SeqCst)
        }

        fn budget(&self) -> u64 {
            self.budget
        }

        fn purge(&self, _older_than: i64) -> usize {
            self.purges.fetch_add(1, Ordering::SeqCst);
            0
        }
    }

    fn weak(cache: &Arc<FakeCache>) -> Weak<dyn Evictable> {
        let weak: Weak<FakeCache> = Arc::downgrade(cache);
        weak
    }

    #[test]
    fn test_register_and_snapshot() {
        let registry = Registry::new();
        let a = FakeCache::new(10, 100);
        let b = FakeCache::new(200, 100);

        let id_a = registry.register(weak(&a));
        let id_b = registry.register(weak(&b));

        assert_ne!(id_a, id_b);
        assert_eq!(registry.len(), 2);

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert!(!snapshot[0].is_over_budget());
        assert!(snapshot[1].is_over_budget());
    }

    #[test]
    fn test_deregister() {
        let registry = Registry::new();
        let a = FakeCache::new(10, 100);
        let id = registry.register(weak(&a));

        assert!(registry.deregister(id));
        assert!(!registry.deregister(id));
        assert!(registry.is_empty());
        assert!(registry.snapshot().is_empty());
    }

    #[test]
    fn test_dropped_cache_is_pruned() {
        let registry = Registry::new();
        let a = FakeCache::new(10, 100);
        registry.register(weak(&a));
        drop(a);

        assert_eq!(registry.len(), 1);
        assert!(registry.snapshot().is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_clones_share_registrations() {
        let registry = Registry::new();
        let other = registry.clone();
        let a = FakeCache::new(10, 100);

        other.register(weak(&a));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_registration_while_snapshot_held() {
        let registry = Registry::new();
        let a = FakeCache::new(500, 100);
        registry.register(weak(&a));

        let snapshot = registry.snapshot();
        // Lock is not held by the snapshot
        let b = FakeCache::new(0, 100);
        registry.register(weak(&b));

        for cache in &snapshot {
            cache.purge(0);
        }
        assert_eq!(a.purges.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 2);
    }
}
