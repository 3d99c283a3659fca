// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Slot-window storage (C1): a fixed-size array of windows, each holding
//! `W` slots, with atomic load/store of each slot and an `initialize` that
//! fills every slot with the empty sentinel.

use crate::{allocator::DeviceAllocator, slot::RawSlot};
use std::sync::atomic::Ordering;

/// A contiguous group of `W` slots — the unit of one probing attempt (§3).
pub struct Window<const W: usize> {
    slots: [RawSlot; W],
}

impl<const W: usize> Window<W> {
    fn empty(empty_key: u64) -> Self {
        Self {
            slots: std::array::from_fn(|_| RawSlot::empty(empty_key)),
        }
    }

    /// Builds a window from `W`-long slices of already-allocated key/payload
    /// scratch words.
    fn from_scratch(key_bits: &[u64], payload_bits: &[u64]) -> Self {
        let mut keys = key_bits.iter();
        let mut payloads = payload_bits.iter();
        Self {
            slots: std::array::from_fn(|_| {
                RawSlot::new(*keys.next().unwrap(), *payloads.next().unwrap())
            }),
        }
    }

    #[inline]
    pub fn slots(&self) -> &[RawSlot; W] {
        &self.slots
    }

    #[inline]
    fn reset(&self, empty_key: u64) {
        for slot in &self.slots {
            slot.reset(empty_key);
        }
    }
}

/// An ordered array of `M` windows (capacity = `M * W` slots), owned by the
/// engine. Non-owning references into it are just `&Storage<W>` borrows,
/// which by construction cannot outlive the owning `Storage`.
pub struct Storage<const W: usize> {
    windows: Box<[Window<W>]>,
}

impl<const W: usize> Storage<W> {
    /// Allocates `num_windows` windows, each already holding the empty
    /// sentinel in every slot. Matches the §3 lifecycle: storage is
    /// constructed, then initialized, before any bulk operation runs.
    pub fn new(num_windows: usize, empty_key: u64) -> Self {
        assert!(num_windows > 0, "storage must have at least one window");
        let windows = (0..num_windows)
            .map(|_| Window::empty(empty_key))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self { windows }
    }

    /// Allocates `num_windows` windows the way [`Self::new`] does, except
    /// the backing key/payload scratch words are requested from `allocator`
    /// rather than built in place — the `rehash`/`retrieve_all` capability
    /// path's actual use of [`DeviceAllocator`] (§6).
    pub fn with_allocator<A: DeviceAllocator>(
        num_windows: usize,
        empty_key: u64,
        allocator: &A,
    ) -> Self {
        assert!(num_windows > 0, "storage must have at least one window");
        let total = num_windows * W;
        let key_bits = allocator.alloc_u64_filled(total, empty_key);
        let payload_bits = allocator.alloc_u64(total);
        let windows = (0..num_windows)
            .map(|i| {
                let start = i * W;
                Window::from_scratch(&key_bits[start..start + W], &payload_bits[start..start + W])
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self { windows }
    }

    #[inline]
    pub fn num_windows(&self) -> usize {
        self.windows.len()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.windows.len() * W
    }

    #[inline]
    pub fn window(&self, index: usize) -> &Window<W> {
        &self.windows[index]
    }

    #[inline]
    pub fn windows(&self) -> &[Window<W>] {
        &self.windows
    }

    /// Re-fills every slot with the empty sentinel (§3: `clear` / rehash
    /// drop of the old storage reuse this on a freshly allocated instance).
    pub fn initialize(&self, empty_key: u64) {
        for window in self.windows.iter() {
            window.reset(empty_key);
        }
    }

    /// Counts filled slots by direct scan; used only by tests and by
    /// `retrieve_all`'s sizing pass, not by the hot-path `size()` (which is
    /// an incrementally-maintained counter — see `table.rs`).
    pub fn count_filled(&self, empty_key: u64, erased_key: Option<u64>) -> usize {
        self.windows
            .iter()
            .flat_map(|w| w.slots.iter())
            .filter(|slot| {
                RawSlot::classify(slot.load_key(Ordering::Acquire), empty_key, erased_key)
                    == crate::slot::SlotState::Filled
            })
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initializes_every_slot_empty() {
        let storage = Storage::<4>::new(4, u64::MAX);
        assert_eq!(storage.capacity(), 16);
        assert_eq!(storage.count_filled(u64::MAX, None), 0);
    }

    #[test]
    fn reinitialize_clears_filled_slots() {
        let storage = Storage::<4>::new(2, u64::MAX);
        storage.window(0).slots()[0]
            .try_fill(u64::MAX, 1, 1)
            .unwrap();
        assert_eq!(storage.count_filled(u64::MAX, None), 1);
        storage.initialize(u64::MAX);
        assert_eq!(storage.count_filled(u64::MAX, None), 0);
    }

    #[test]
    fn with_allocator_produces_an_empty_storage_of_the_requested_shape() {
        let storage = Storage::<4>::with_allocator(3, u64::MAX, &crate::allocator::SystemAllocator);
        assert_eq!(storage.num_windows(), 3);
        assert_eq!(storage.capacity(), 12);
        assert_eq!(storage.count_filled(u64::MAX, None), 0);
    }
}
