// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The rehash driver (C7): allocate a fresh [`Storage`] at a new extent,
//! reinsert every live entry from the old one, then atomically swap it in.
//! Grounded on §4.7 and, for the swap itself, on `PeerMap`'s
//! `parking_lot::RwLock`-guarded table (`path/secret/map/state.rs`) — the
//! same "build the replacement off to the side, then publish it under the
//! lock" shape, generalized from a `hashbrown::HashTable` swap to a
//! `Storage<W>` swap.

use crate::{
    allocator::DeviceAllocator, event, group, hash::KeyHasher, mode::Mode,
    probing::ProbingScheme, sentinel::Sentinels,
    slot::{RawSlot, SlotState}, storage::Storage,
};
use std::sync::{atomic::Ordering, Arc};

/// Builds a new `Storage<W>` sized for `new_lower_bound_capacity`, reinserts
/// every slot currently filled in `old`, and returns it. Does not touch
/// `old` and does not publish the result — the caller (`Table::rehash`)
/// swaps it in under its `parking_lot::RwLock`.
///
/// The replacement storage's scratch words are requested from `allocator`
/// (via [`Storage::with_allocator`]) rather than built in place, so the
/// `DeviceAllocator` capability actually backs the buffer a rehash grows
/// into, not just `retrieve_all`'s output.
///
/// Runs the reinsertion scan across worker lanes the same way
/// [`crate::dispatch`] fans out bulk operations: each lane owns a disjoint,
/// contiguous run of the old storage's windows.
pub fn rehash<K, const W: usize, P, H, A>(
    old: &Storage<W>,
    scheme: &P,
    hasher: &H,
    sentinels: &Sentinels<K>,
    mode: Mode,
    new_lower_bound_capacity: usize,
    allocator: &A,
) -> Arc<Storage<W>>
where
    K: Send + Sync,
    P: ProbingScheme,
    H: KeyHasher<K>,
    K: crate::key::Key,
    A: DeviceAllocator,
{
    let new_num_windows = crate::probing::make_window_extent(new_lower_bound_capacity, W);
    let new_storage = Arc::new(Storage::<W>::with_allocator(
        new_num_windows,
        sentinels.empty_key_bits(),
        allocator,
    ));

    event::rehash_started(old.capacity(), new_storage.capacity());

    let windows = old.windows();
    let lanes = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(windows.len().max(1));
    let chunk_len = windows.len().div_ceil(lanes).max(1);

    let moved: usize = std::thread::scope(|s| {
        let handles: Vec<_> = windows
            .chunks(chunk_len)
            .map(|chunk| {
                let new_storage = &new_storage;
                s.spawn(move || {
                    let mut moved = 0usize;
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
                            let hash = hasher.hash(K::from_bits(key_bits));
                            group::probe_insert(
                                new_storage,
                                scheme,
                                hash,
                                key_bits,
                                payload_bits,
                                sentinels.empty_key_bits(),
                                sentinels.erased_key_bits(),
                                mode,
                            );
                            moved += 1;
                        }
                    }
                    moved
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("rehash lane panicked"))
            .sum()
    });

    event::rehash_completed(new_storage.capacity(), moved);
    new_storage
}
