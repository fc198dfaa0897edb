//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check slot semantics and memory accounting against a
//! simple model.

use proptest::prelude::*;
use std::sync::Arc;

use crate::cache::ByteCache;
use crate::clock::{Clock, ManualClock};
use crate::registry::Registry;

// == Test Configuration ==
const TEST_SLOTS: usize = 16;
const T0: i64 = 1_700_000_000;

// == Strategies ==
/// Indices mostly in range, with some past the end
fn index_strategy() -> impl Strategy<Value = usize> {
    prop_oneof![
        4 => 0..TEST_SLOTS,
        1 => TEST_SLOTS..TEST_SLOTS * 4,
    ]
}

fn payload_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..128)
}

/// Slot operations for model checking
#[derive(Debug, Clone)]
enum SlotOp {
    Store { index: usize, payload: Vec<u8> },
    Replace { index: usize, payload: Vec<u8> },
    Remove { index: usize },
    Get { index: usize },
    Advance { secs: i64 },
}

fn slot_op_strategy() -> impl Strategy<Value = SlotOp> {
    prop_oneof![
        (index_strategy(), payload_strategy())
            .prop_map(|(index, payload)| SlotOp::Store { index, payload }),
        (index_strategy(), payload_strategy())
            .prop_map(|(index, payload)| SlotOp::Replace { index, payload }),
        index_strategy().prop_map(|index| SlotOp::Remove { index }),
        index_strategy().prop_map(|index| SlotOp::Get { index }),
        (1i64..3_600).prop_map(|secs| SlotOp::Advance { secs }),
    ]
}

fn test_cache() -> (Registry, ManualClock, Arc<ByteCache>) {
    let registry = Registry::new();
    let clock = ManualClock::new(T0);
    let cache = ByteCache::bytes_builder()
        .slots(TEST_SLOTS)
        .budget_bytes(u64::MAX)
        .clock(Arc::new(clock.clone()))
        .build(&registry);
    (registry, clock, cache)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // *For any* sequence of operations, the cache agrees with a plain vector
    // model on every slot's payload and last access, and the memory counter
    // equals the sum of live payload lengths.
    #[test]
    fn prop_matches_model(ops in prop::collection::vec(slot_op_strategy(), 1..80)) {
        let (_registry, clock, cache) = test_cache();
        let mut model: Vec<Option<(Vec<u8>, i64)>> = vec![None; TEST_SLOTS];

        for op in ops {
            let now = clock.now();
            match op {
                SlotOp::Store { index, payload } => {
                    cache.store(index, payload.clone());
                    if let Some(slot) = model.get_mut(index) {
                        if slot.is_none() {
                            *slot = Some((payload, now));
                        }
                    }
                }
                SlotOp::Replace { index, payload } => {
                    cache.replace(index, payload.clone());
                    if let Some(slot) = model.get_mut(index) {
                        *slot = Some((payload, now));
                    }
                }
                SlotOp::Remove { index } => {
                    cache.remove(index);
                    if let Some(slot) = model.get_mut(index) {
                        *slot = None;
                    }
                }
                SlotOp::Get { index } => {
                    let found = cache.get(index);
                    let expected = model.get_mut(index).and_then(|slot| slot.as_mut());
                    match (found, expected) {
                        (Some(found), Some((payload, last_access))) => {
                            prop_assert_eq!(found.as_slice(), payload.as_slice());
                            *last_access = now;
                        }
                        (None, None) => {}
                        (found, expected) => {
                            prop_assert!(false, "get({}) = {:?}, model = {:?}", index, found, expected);
                        }
                    }
                }
                SlotOp::Advance { secs } => clock.advance(secs),
            }
        }

        let expected_memory: u64 = model
            .iter()
            .flatten()
            .map(|(payload, _)| payload.len() as u64)
            .sum();
        prop_assert_eq!(cache.memory(), expected_memory);
        prop_assert_eq!(cache.len(), model.iter().flatten().count());

        for (index, slot) in model.iter().enumerate() {
            prop_assert_eq!(cache.last_access(index), slot.as_ref().map(|(_, at)| *at));
        }
    }

    // *For any* occupied slot, a second store never changes its payload.
    #[test]
    fn prop_store_never_overwrites(
        index in 0..TEST_SLOTS,
        first in payload_strategy(),
        second in payload_strategy()
    ) {
        let (_registry, _clock, cache) = test_cache();

        cache.store(index, first.clone());
        cache.store(index, second);

        let stored = cache.get(index).unwrap();
        prop_assert_eq!(stored.as_slice(), first.as_slice());
        prop_assert_eq!(cache.memory(), first.len() as u64);
    }

    // *For any* set of last-access ages and threshold, purge removes exactly
    // the entries accessed before the threshold and leaves the rest untouched.
    #[test]
    fn prop_purge_removes_exactly_idle_entries(
        ages in prop::collection::vec(0i64..10_000, 1..TEST_SLOTS),
        cutoff in 0i64..10_000
    ) {
        let (_registry, clock, cache) = test_cache();
        let now = T0 + 10_000;

        for (index, age) in ages.iter().enumerate() {
            clock.set(now - age);
            cache.store(index, vec![index as u8; index + 1]);
        }

        let threshold = now - cutoff;
        let removed = cache.purge(threshold);

        let expected_removed = ages.iter().filter(|age| now - **age < threshold).count();
        prop_assert_eq!(removed, expected_removed);

        let mut expected_memory = 0u64;
        for (index, age) in ages.iter().enumerate() {
            let last_access = now - age;
            if last_access < threshold {
                prop_assert!(cache.last_access(index).is_none());
            } else {
                prop_assert_eq!(cache.last_access(index), Some(last_access));
                expected_memory += index as u64 + 1;
            }
        }
        prop_assert_eq!(cache.memory(), expected_memory);
    }

    // *For any* closed cache, every read misses and no write is accounted.
    #[test]
    fn prop_closed_cache_is_inert(
        ops in prop::collection::vec(slot_op_strategy(), 1..40)
    ) {
        let (registry, _clock, cache) = test_cache();
        cache.store(0, vec![1, 2, 3]);
        cache.close();

        for op in ops {
            match op {
                SlotOp::Store { index, payload } => cache.store(index, payload),
                SlotOp::Replace { index, payload } => cache.replace(index, payload),
                SlotOp::Remove { index } => cache.remove(index),
                SlotOp::Get { index } => {
                    prop_assert!(cache.get(index).is_none());
                }
                SlotOp::Advance { .. } => {}
            }
        }

        prop_assert_eq!(cache.memory(), 0);
        prop_assert!(cache.is_empty());
        prop_assert!(registry.is_empty());
    }
}
