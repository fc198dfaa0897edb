//! Cache Entry Module
//!
//! Defines the occupant of a single slot: payload, accounted size and
//! last-access time. Entries live inside their slot's mutex, which is the
//! entry lock every read and write goes through.

use std::sync::Arc;

// == Cache Entry ==
/// A single slot occupant.
#[derive(Debug)]
pub struct Entry<T> {
    /// The stored payload, shared with readers
    payload: Arc<T>,
    /// Bytes charged against the cache budget
    size: u64,
    /// Last read or write (unix seconds)
    last_access: i64,
}

impl<T> Entry<T> {
    // == Constructor ==
    /// Creates an entry accessed at `now`.
    pub fn new(payload: T, size: u64, now: i64) -> Self {
        Self {
            payload: Arc::new(payload),
            size,
            last_access: now,
        }
    }

    /// Returns a shared handle to the live payload.
    pub fn payload(&self) -> Arc<T> {
        Arc::clone(&self.payload)
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn last_access(&self) -> i64 {
        self.last_access
    }

    // == Touch ==
    /// Records a read at `now`.
    pub fn touch(&mut self, now: i64) {
        self.last_access = now;
    }

    // == Replace ==
    /// Swaps in a new payload and returns the size it replaced.
    pub fn replace(&mut self, payload: T, size: u64, now: i64) -> u64 {
        let old_size = self.size;
        self.payload = Arc::new(payload);
        self.size = size;
        self.last_access = now;
        old_size
    }

    // == Is Idle ==
    /// True if the entry was last accessed strictly before `older_than`.
    pub fn is_idle_since(&self, older_than: i64) -> bool {
        self.last_access < older_than
    }
}
