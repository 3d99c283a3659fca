// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The per-slot storage primitive (part of C1) and the slot state predicate
//! (C3). A slot is a 128-bit value split into a key half and a payload half
//! (§4.1); the key half is the synchronization word, written last on insert
//! and cleared first on erase, following the pattern `SharedSlot` in the
//! teacher's replay-detection table uses for its tagged `AtomicU64` key_id
//! word (lock/present bits packed into the high bits of a single atomic).

use std::sync::atomic::{AtomicU64, Ordering};

/// A single slot: a key half (the sync word) and a payload half.
///
/// Both halves are independent `AtomicU64`s rather than one 128-bit atomic:
/// stable Rust has no portable 128-bit atomic, so the slot is always split,
/// which is the "otherwise" branch of §4.1 for implementations without a
/// double-word atomic.
#[derive(Debug)]
pub struct RawSlot {
    key: AtomicU64,
    payload: AtomicU64,
}

/// The classification of a slot's current contents (C3).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotState {
    Empty,
    Erased,
    Filled,
}

impl RawSlot {
    /// Constructs a slot already holding the empty sentinel.
    pub fn empty(empty_key: u64) -> Self {
        Self {
            key: AtomicU64::new(empty_key),
            payload: AtomicU64::new(0),
        }
    }

    /// Constructs a slot from an already-allocated pair of key/payload bit
    /// patterns, e.g. scratch words handed back by a [`crate::allocator::DeviceAllocator`].
    pub fn new(key_bits: u64, payload_bits: u64) -> Self {
        Self {
            key: AtomicU64::new(key_bits),
            payload: AtomicU64::new(payload_bits),
        }
    }

    /// Resets a slot back to the empty sentinel (used by `clear`/rehash init).
    #[inline]
    pub fn reset(&self, empty_key: u64) {
        self.payload.store(0, Ordering::Relaxed);
        self.key.store(empty_key, Ordering::Relaxed);
    }

    #[inline]
    pub fn load_key(&self, order: Ordering) -> u64 {
        self.key.load(order)
    }

    #[inline]
    pub fn load_payload(&self, order: Ordering) -> u64 {
        self.payload.load(order)
    }

    /// Classifies the currently-loaded `key` bits against the sentinels.
    #[inline]
    pub fn classify(key_bits: u64, empty_key: u64, erased_key: Option<u64>) -> SlotState {
        if key_bits == empty_key {
            SlotState::Empty
        } else if erased_key == Some(key_bits) {
            SlotState::Erased
        } else {
            SlotState::Filled
        }
    }

    /// Attempts to transition this slot from `observed_key` to a filled
    /// value `(new_key, new_payload)`. Writes the payload first with
    /// relaxed ordering, then the key half with release ordering, so that a
    /// reader that observes a filled key under acquire ordering is
    /// guaranteed to observe its payload (§4.4).
    #[inline]
    pub fn try_fill(&self, observed_key: u64, new_key: u64, new_payload: u64) -> Result<(), u64> {
        self.payload.store(new_payload, Ordering::Relaxed);
        self.key
            .compare_exchange(
                observed_key,
                new_key,
                Ordering::Release,
                Ordering::Acquire,
            )
            .map(|_| ())
    }

    /// Attempts to transition this slot's key half to the erased sentinel.
    /// The key is cleared first (§4.4): a concurrent reader that still sees
    /// the old key may race harmlessly with the eraser, but never observes
    /// a "half erased" payload because only the key half carries meaning.
    #[inline]
    pub fn try_erase(&self, observed_key: u64, erased_key: u64) -> Result<(), u64> {
        self.key
            .compare_exchange(observed_key, erased_key, Ordering::Release, Ordering::Acquire)
            .map(|_| ())
    }
}
