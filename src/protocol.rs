// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The single-slot protocol (C4): CAS-based insert, find, and erase against
//! one slot, with sentinel semantics. Generalizes the retry-on-CAS-failure
//! loop the teacher's `SharedSlot::try_lock` uses for a single tagged
//! `AtomicU64`, to the two-word (key, payload) slot this engine's §4.1
//! packing calls for.

use crate::slot::{RawSlot, SlotState};
use std::sync::atomic::Ordering;

/// Outcome of attempting to insert into one slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The slot already held an equal key.
    Present,
    /// This call won the race and filled the slot.
    Inserted,
    /// The slot is occupied by an unrelated key (or the CAS lost a race to
    /// a winner holding a different key); the caller should advance to the
    /// next slot/window.
    Continue,
}

/// Outcome of probing one slot for a key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FindOutcome {
    Found(u64),
    NotFound,
    Continue,
}

/// Outcome of attempting to erase a key from one slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EraseOutcome {
    Erased,
    NotFound,
    Continue,
}

/// §4.4 step 1–4: insert `key`/`payload` into `slot` if reusable, detect an
/// existing equal key, otherwise signal the caller to keep probing.
#[inline]
pub fn insert_slot(
    slot: &RawSlot,
    key: u64,
    payload: u64,
    empty_key: u64,
    erased_key: Option<u64>,
) -> InsertOutcome {
    loop {
        let observed = slot.load_key(Ordering::Acquire);
        match RawSlot::classify(observed, empty_key, erased_key) {
            SlotState::Filled if observed == key => return InsertOutcome::Present,
            SlotState::Filled => return InsertOutcome::Continue,
            SlotState::Empty | SlotState::Erased => {
                match slot.try_fill(observed, key, payload) {
                    Ok(()) => return InsertOutcome::Inserted,
                    Err(winner) => {
                        match RawSlot::classify(winner, empty_key, erased_key) {
                            SlotState::Filled if winner == key => return InsertOutcome::Present,
                            // Someone else filled or re-tombstoned this slot
                            // out from under us; reclassify and retry this
                            // same slot rather than silently continuing, so
                            // a still-empty/erased slot isn't skipped.
                            _ => continue,
                        }
                    }
                }
            }
        }
    }
}

/// §4.4 "Find": load-only, no mutation.
#[inline]
pub fn find_slot(slot: &RawSlot, key: u64, empty_key: u64, erased_key: Option<u64>) -> FindOutcome {
    let observed = slot.load_key(Ordering::Acquire);
    match RawSlot::classify(observed, empty_key, erased_key) {
        SlotState::Empty => FindOutcome::NotFound,
        SlotState::Filled if observed == key => {
            FindOutcome::Found(slot.load_payload(Ordering::Acquire))
        }
        SlotState::Filled | SlotState::Erased => FindOutcome::Continue,
    }
}

/// §4.4 "Erase": CAS the key half to the erased sentinel.
#[inline]
pub fn erase_slot(
    slot: &RawSlot,
    key: u64,
    empty_key: u64,
    erased_key: u64,
) -> EraseOutcome {
    loop {
        let observed = slot.load_key(Ordering::Acquire);
        match RawSlot::classify(observed, empty_key, Some(erased_key)) {
            SlotState::Empty => return EraseOutcome::NotFound,
            SlotState::Erased => return EraseOutcome::Continue,
            SlotState::Filled if observed != key => return EraseOutcome::Continue,
            SlotState::Filled => match slot.try_erase(observed, erased_key) {
                Ok(()) => return EraseOutcome::Erased,
                Err(_) => continue,
            },
        }
    }
}
