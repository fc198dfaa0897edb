//! Slot Cache Module
//!
//! Fixed-capacity cache addressed by dense integer indices, generic over the
//! payload type. Each slot is guarded by its own mutex, so operations on one
//! slot are serialized while different slots never contend. The aggregate
//! memory counter is adjusted atomically under the slot lock of the entry
//! that changed, and saturates at `u64::MAX` instead of wrapping.
//!
//! Out-of-range indices are never an error: reads miss and writes do nothing.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::debug;

use crate::cache::{CacheStats, Entry, MEGABYTE};
use crate::clock::{system_clock, Clock};
use crate::registry::{CacheId, Evictable, Registry};

/// Computes the bytes charged for a payload.
pub type Sizer<T> = fn(&T) -> u64;

/// Cache of raw byte buffers, sized by length.
pub type ByteCache = SlotCache<Vec<u8>>;

#[allow(clippy::ptr_arg)]
fn byte_len(payload: &Vec<u8>) -> u64 {
    payload.len() as u64
}

type Slot<T> = Mutex<Option<Entry<T>>>;

// == Slot Cache ==
/// Fixed-length table of optional entries with a memory budget.
pub struct SlotCache<T> {
    id: CacheId,
    label: String,
    slots: Vec<Slot<T>>,
    /// Logical size; zero once closed
    size: AtomicUsize,
    closed: AtomicBool,
    memory: AtomicU64,
    budget: AtomicU64,
    occupied: AtomicUsize,
    hits: AtomicU64,
    misses: AtomicU64,
    purged: AtomicU64,
    sizer: Sizer<T>,
    clock: Arc<dyn Clock>,
    registry: Registry,
}

impl<T: Send + Sync + 'static> SlotCache<T> {
    // == Constructors ==
    /// Creates a cache of `slots` empty slots with a budget in bytes and
    /// registers it.
    ///
    /// `sizer` charges payloads written through `store` and `replace`; it
    /// must account for any heap memory the payload owns.
    pub fn new(
        slots: usize,
        budget_bytes: u64,
        sizer: Sizer<T>,
        registry: &Registry,
    ) -> Arc<Self> {
        Self::builder(sizer)
            .slots(slots)
            .budget_bytes(budget_bytes)
            .build(registry)
    }

    pub fn builder(sizer: Sizer<T>) -> SlotCacheBuilder<T> {
        SlotCacheBuilder::new(sizer)
    }
}

impl SlotCache<Vec<u8>> {
    /// Creates a byte cache whose entries are charged their length.
    pub fn bytes(slots: usize, budget_bytes: u64, registry: &Registry) -> Arc<Self> {
        Self::bytes_builder()
            .slots(slots)
            .budget_bytes(budget_bytes)
            .build(registry)
    }

    pub fn bytes_builder() -> SlotCacheBuilder<Vec<u8>> {
        SlotCacheBuilder::new(byte_len)
    }
}

impl<T> SlotCache<T> {
    /// Runs `f` on the slot at `index` under its lock.
    ///
    /// Returns `None` without locking when the index is out of range, and
    /// re-checks the closed flag once the lock is held so nothing is written
    /// into a slot that `close` already drained.
    fn with_slot<R>(
        &self,
        index: usize,
        f: impl FnOnce(&mut Option<Entry<T>>) -> R,
    ) -> Option<R> {
        if index >= self.size.load(Ordering::Acquire) {
            return None;
        }
        let slot = self.slots.get(index)?;
        let mut guard = slot.lock();
        if self.closed.load(Ordering::Acquire) {
            return None;
        }
        Some(f(&mut *guard))
    }

    fn charge(&self, bytes: u64) {
        let _ = self
            .memory
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |memory| {
                Some(memory.saturating_add(bytes))
            });
    }

    fn release(&self, bytes: u64) {
        let _ = self
            .memory
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |memory| {
                Some(memory.saturating_sub(bytes))
            });
    }

    /// Fills an empty slot. Caller holds the slot lock.
    fn occupy(&self, slot: &mut Option<Entry<T>>, entry: Entry<T>) {
        self.charge(entry.size());
        self.occupied.fetch_add(1, Ordering::AcqRel);
        *slot = Some(entry);
    }

    /// Empties a slot and releases its memory. Caller holds the slot lock.
    fn vacate(&self, slot: &mut Option<Entry<T>>) -> bool {
        match slot.take() {
            Some(entry) => {
                self.release(entry.size());
                self.occupied.fetch_sub(1, Ordering::AcqRel);
                true
            }
            None => false,
        }
    }

    // == Get ==
    /// Returns the payload at `index` and refreshes its last-access time.
    ///
    /// The returned handle is the live payload, not a copy.
    pub fn get(&self, index: usize) -> Option<Arc<T>> {
        let now = self.clock.now();
        let payload = self
            .with_slot(index, |slot| {
                slot.as_mut().map(|entry| {
                    entry.touch(now);
                    entry.payload()
                })
            })
            .flatten();

        match payload {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        payload
    }

    // == Store ==
    /// Caches `payload` at `index` unless the slot is occupied.
    ///
    /// The size is taken from the cache's sizer.
    pub fn store(&self, index: usize, payload: T) {
        let size = (self.sizer)(&payload);
        self.store_sized(index, payload, size);
    }

    /// Like `store` with an explicit size. Exactly one of several concurrent
    /// writers to an empty slot wins.
    pub fn store_sized(&self, index: usize, payload: T, size: u64) {
        let now = self.clock.now();
        self.with_slot(index, |slot| {
            if slot.is_none() {
                self.occupy(slot, Entry::new(payload, size, now));
            }
        });
    }

    // == Replace ==
    /// Caches `payload` at `index`, overwriting any existing entry.
    pub fn replace(&self, index: usize, payload: T) {
        let size = (self.sizer)(&payload);
        self.replace_sized(index, payload, size);
    }

    /// Like `replace` with an explicit size.
    pub fn replace_sized(&self, index: usize, payload: T, size: u64) {
        let now = self.clock.now();
        self.with_slot(index, |slot| {
            if let Some(entry) = slot.as_mut() {
                let old_size = entry.replace(payload, size, now);
                if size >= old_size {
                    self.charge(size - old_size);
                } else {
                    self.release(old_size - size);
                }
            } else {
                self.occupy(slot, Entry::new(payload, size, now));
            }
        });
    }

    // == Remove ==
    /// Clears the slot at `index`.
    pub fn remove(&self, index: usize) {
        self.with_slot(index, |slot| self.vacate(slot));
    }

    // == Purge ==
    /// Removes every entry last accessed before `older_than` (unix seconds),
    /// scanning slots in index order. Returns the number removed.
    pub fn purge(&self, older_than: i64) -> usize {
        let mut removed = 0;
        for slot in &self.slots {
            let mut guard = slot.lock();
            let idle = guard
                .as_ref()
                .is_some_and(|entry| entry.is_idle_since(older_than));
            if idle && self.vacate(&mut *guard) {
                removed += 1;
            }
        }
        self.purged.fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    // == Close ==
    /// Makes the cache inert: size, budget and memory drop to zero, every
    /// slot is cleared and the cache leaves its registry.
    ///
    /// Payloads already returned by `get` stay valid for their holders.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.size.store(0, Ordering::Release);
        self.budget.store(0, Ordering::Release);
        for slot in &self.slots {
            self.vacate(&mut *slot.lock());
        }
        self.memory.store(0, Ordering::Release);
        self.registry.deregister(self.id);
        debug!("Closed cache {}", self.label);
    }

    // == Introspection ==
    pub fn id(&self) -> CacheId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Number of addressable slots; zero once closed.
    pub fn capacity(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.occupied.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Approximate bytes held by live entries.
    pub fn memory(&self) -> u64 {
        self.memory.load(Ordering::Acquire)
    }

    pub fn budget(&self) -> u64 {
        self.budget.load(Ordering::Acquire)
    }

    pub fn is_over_budget(&self) -> bool {
        self.memory() > self.budget()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Last-access time of the entry at `index`, without touching it.
    pub fn last_access(&self, index: usize) -> Option<i64> {
        self.with_slot(index, |slot| slot.as_ref().map(Entry::last_access))
            .flatten()
    }

    // == Stats ==
    /// Returns a point-in-time snapshot of counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            label: self.label.clone(),
            capacity: self.capacity(),
            occupied: self.len(),
            memory_bytes: self.memory(),
            budget_bytes: self.budget(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            purged: self.purged.load(Ordering::Relaxed),
            closed: self.is_closed(),
        }
    }
}

impl<T: Send + Sync + 'static> Evictable for SlotCache<T> {
    fn label(&self) -> &str {
        SlotCache::label(self)
    }

    fn memory(&self) -> u64 {
        SlotCache::memory(self)
    }

    fn budget(&self) -> u64 {
        SlotCache::budget(self)
    }

    fn purge(&self, older_than: i64) -> usize {
        SlotCache::purge(self, older_than)
    }
}

impl<T> Drop for SlotCache<T> {
    fn drop(&mut self) {
        self.registry.deregister(self.id);
    }
}

impl<T> fmt::Debug for SlotCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotCache")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("capacity", &self.capacity())
            .field("occupied", &self.len())
            .field("memory", &self.memory())
            .field("budget", &self.budget())
            .finish()
    }
}

// == Builder ==
/// Configures and registers a `SlotCache`. The sizer is fixed up front.
pub struct SlotCacheBuilder<T> {
    slots: usize,
    budget_bytes: u64,
    sizer: Sizer<T>,
    clock: Arc<dyn Clock>,
    label: Option<String>,
}

impl<T: Send + Sync + 'static> SlotCacheBuilder<T> {
    fn new(sizer: Sizer<T>) -> Self {
        Self {
            slots: 0,
            budget_bytes: 0,
            sizer,
            clock: system_clock(),
            label: None,
        }
    }

    pub fn slots(mut self, slots: usize) -> Self {
        self.slots = slots;
        self
    }

    pub fn budget_bytes(mut self, budget: u64) -> Self {
        self.budget_bytes = budget;
        self
    }

    pub fn budget_megabytes(mut self, megabytes: u64) -> Self {
        self.budget_bytes = megabytes.saturating_mul(MEGABYTE);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Allocates the slots and registers the cache with `registry`.
    pub fn build(self, registry: &Registry) -> Arc<SlotCache<T>> {
        let id = registry.allocate_id();
        let label = self.label.unwrap_or_else(|| format!("cache-{}", id));
        let cache = Arc::new(SlotCache {
            id,
            label,
            slots: (0..self.slots).map(|_| Mutex::new(None)).collect(),
            size: AtomicUsize::new(self.slots),
            closed: AtomicBool::new(false),
            memory: AtomicU64::new(0),
            budget: AtomicU64::new(self.budget_bytes),
            occupied: AtomicUsize::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            purged: AtomicU64::new(0),
            sizer: self.sizer,
            clock: self.clock,
            registry: registry.clone(),
        });
        let weak: Weak<SlotCache<T>> = Arc::downgrade(&cache);
        registry.register_with_id(id, weak);
        debug!(
            "Registered cache {} with {} slots and a budget of {} bytes",
            cache.label, self.slots, self.budget_bytes
        );
        cache
    }
}
