// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Retrieve-all (C8): a parallel stream-compaction scan over every window,
//! collecting each filled slot's (key, value) pair. Grounded on §4.8. Each
//! lane scans a disjoint, contiguous run of windows and returns its own
//! local buffer of matches; the caller concatenates them after the scope
//! joins, which sidesteps needing an atomic write-index into one shared
//! output buffer (the bump-allocator approach §4.8 describes for the
//! device-side kernel) while keeping the same per-lane-disjoint-scan shape.
//! The allocator capability still sizes the final, contiguous result via
//! `DeviceAllocator`, matching the teacher's pattern of pre-sizing a buffer
//! from a preliminary scan (`path/secret/map/size_of.rs`).

use crate::{
    allocator::DeviceAllocator,
    key::Key,
    sentinel::Sentinels,
    slot::{RawSlot, SlotState},
    storage::Storage,
    value::Value,
};
use std::sync::atomic::Ordering;

/// §4.8: scans every slot in `storage`, returning every filled `(key,
/// value)` pair. The output order is unspecified across calls (Non-goal:
/// strict iteration order).
pub fn retrieve_all<K, V, const W: usize, A>(
    storage: &Storage<W>,
    sentinels: &Sentinels<K>,
    allocator: &A,
) -> (Vec<K>, Vec<V>)
where
    K: Key,
    V: Value,
    A: DeviceAllocator,
{
    let windows = storage.windows();
    let lanes = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(windows.len().max(1));
    let chunk_len = windows.len().div_ceil(lanes).max(1);

    let per_lane: Vec<Vec<(u64, u64)>> = std::thread::scope(|s| {
        let handles: Vec<_> = windows
            .chunks(chunk_len)
            .map(|chunk| {
                s.spawn(move || {
                    let mut found = Vec::new();
                    for window in chunk {
                        for slot in window.slots() {
                            let key_bits = slot.load_key(Ordering::Acquire);
                            if RawSlot::classify(
                                key_bits,
                                sentinels.empty_key_bits(),
                                sentinels.erased_key_bits(),
                            ) != SlotState::Filled
                            {
                                continue;
                            }
                            let payload_bits = slot.load_payload(Ordering::Acquire);
                            found.push((key_bits, payload_bits));
                        }
                    }
                    found
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("retrieve_all lane panicked"))
            .collect()
    });

    let live: usize = per_lane.iter().map(Vec::len).sum();
    // The allocator capability backs the output buffers themselves: a
    // preliminary scan determines `live`, then scratch of exactly that size
    // is requested and filled in place, the way the teacher's `size_of.rs`
    // pass pre-sizes a buffer before a copy.
    let mut key_bits_out = allocator.alloc_u64(live);
    let mut payload_bits_out = allocator.alloc_u64(live);
    for (i, (key_bits, payload_bits)) in per_lane.into_iter().flatten().enumerate() {
        key_bits_out[i] = key_bits;
        payload_bits_out[i] = payload_bits;
    }

    let keys = key_bits_out.into_iter().map(K::from_bits).collect();
    let values = payload_bits_out.into_iter().map(V::from_bits).collect();
    (keys, values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{allocator::SystemAllocator, group, mode::Mode, probing::LinearProbing};

    #[test]
    fn retrieve_all_round_trips_every_inserted_pair() {
        let sentinels = Sentinels::<u64>::with_erase(u64::MAX, u64::MAX - 1).unwrap();
        let storage = Storage::<4>::new(8, sentinels.empty_key_bits());
        let scheme = LinearProbing;

        let mut expected = std::collections::HashMap::new();
        for key in 0u64..20 {
            let value = key * 10;
            group::probe_insert(
                &storage,
                &scheme,
                key,
                key,
                value,
                sentinels.empty_key_bits(),
                sentinels.erased_key_bits(),
                Mode::Unique,
            );
            expected.insert(key, value);
        }

        let (keys, values) = retrieve_all::<u64, u64, 4, _>(&storage, &sentinels, &SystemAllocator);
        assert_eq!(keys.len(), expected.len());
        let actual: std::collections::HashMap<u64, u64> = keys.into_iter().zip(values).collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn retrieve_all_on_empty_storage_is_empty() {
        let sentinels = Sentinels::<u64>::new(u64::MAX);
        let storage = Storage::<4>::new(4, sentinels.empty_key_bits());
        let (keys, values) = retrieve_all::<u64, u64, 4, _>(&storage, &sentinels, &SystemAllocator);
        assert!(keys.is_empty());
        assert!(values.is_empty());
    }
}
