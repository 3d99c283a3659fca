// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The cooperative-group probe loop (C5) — the distinguishing piece of the
//! design (§4.5). Each logical probe scans one window's `W` slots as a
//! group, takes a ballot over what it saw, then either returns a decisive
//! result or lets the lowest-indexed eligible slot perform the CAS before
//! advancing.
//!
//! This crate has no literal hardware lanes; a "group" here is one caller
//! (one OS thread processing one key out of a bulk call) scanning a
//! window's slots in lane order. The genuine cross-lane race the spec
//! describes instead arises *between different keys*: two different bulk
//! dispatch workers probing the same window concurrently still resolve
//! correctly, because every mutation goes through the atomic CAS in
//! `protocol.rs` — the same mechanism `SharedSlot::try_lock`'s
//! compare_exchange retry loop in the teacher's replay-detection table uses
//! for single-slot contention, generalized here to a window of slots.
//!
//! Open question (spec §9, unresolved in the source): simultaneous
//! in-flight `insert_async`/`erase_async` against the same table from
//! different streams is undefined here too; no runtime guard is added.

use crate::{
    event,
    mode::Mode,
    probing::ProbingScheme,
    protocol,
    slot::{RawSlot, SlotState},
    storage::Storage,
};
use std::sync::atomic::Ordering;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroupInsertOutcome {
    Present,
    Inserted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroupFindOutcome {
    Found(u64),
    NotFound,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroupEraseOutcome {
    Erased,
    NotFound,
}

/// Ballot over one window's slots, from the perspective of a single key.
struct Ballot {
    /// Lowest-indexed slot holding an equal key, if any.
    match_index: Option<usize>,
    /// Lowest-indexed empty-or-erased (reusable) slot, if any.
    reusable_index: Option<usize>,
    /// Whether any slot in the window was empty (probe-terminating for
    /// find/erase, but not for insert, which may reuse an erased slot past
    /// an empty one only if encountered first in lane order).
    saw_empty: bool,
}

/// Scans every lane of `window`, regardless of an earlier match. A `Mode`
/// that allows duplicate keys needs a reusable lane even in a window that
/// already holds a match for this key — e.g. packing a second copy of a
/// duplicated key into the same window's remaining empty lanes — so this
/// never short-circuits on `match_index`.
fn ballot<const W: usize>(
    window: &crate::storage::Window<W>,
    key: u64,
    empty_key: u64,
    erased_key: Option<u64>,
) -> Ballot {
    let mut match_index = None;
    let mut reusable_index = None;
    let mut saw_empty = false;

    for (lane, slot) in window.slots().iter().enumerate() {
        let observed = slot.load_key(Ordering::Acquire);
        match RawSlot::classify(observed, empty_key, erased_key) {
            SlotState::Filled if observed == key => {
                if match_index.is_none() {
                    match_index = Some(lane);
                }
            }
            SlotState::Filled => {}
            SlotState::Empty => {
                saw_empty = true;
                if reusable_index.is_none() {
                    reusable_index = Some(lane);
                }
            }
            SlotState::Erased => {
                if reusable_index.is_none() {
                    reusable_index = Some(lane);
                }
            }
        }
    }

    Ballot {
        match_index,
        reusable_index,
        saw_empty,
    }
}

fn attempts<const W: usize, P: ProbingScheme>(
    storage: &Storage<W>,
    scheme: &P,
    hash: u64,
) -> impl Iterator<Item = usize> + '_ {
    let num_windows = storage.num_windows();
    (0..num_windows).map(move |attempt| scheme.window(hash, attempt, num_windows))
}

/// §4.5 step 5: insert, with the group's lowest reusable lane performing
/// the CAS and the whole group retrying the same window on CAS failure.
pub fn probe_insert<const W: usize, P: ProbingScheme>(
    storage: &Storage<W>,
    scheme: &P,
    hash: u64,
    key: u64,
    payload: u64,
    empty_key: u64,
    erased_key: Option<u64>,
    mode: Mode,
) -> GroupInsertOutcome {
    for window_index in attempts(storage, scheme, hash) {
        let window = storage.window(window_index);
        loop {
            let ballot = ballot(window, key, empty_key, erased_key);

            if mode == Mode::Unique && ballot.match_index.is_some() {
                return GroupInsertOutcome::Present;
            }

            let Some(lane) = ballot.reusable_index else {
                // Fully filled window with no equal key and no reusable
                // slot: advance to the next window.
                break;
            };

            let slot = &window.slots()[lane];
            match protocol::insert_slot(slot, key, payload, empty_key, erased_key) {
                protocol::InsertOutcome::Inserted => return GroupInsertOutcome::Inserted,
                protocol::InsertOutcome::Present if mode == Mode::Unique => {
                    return GroupInsertOutcome::Present
                }
                // Either the window lost the race for this lane (someone
                // else filled it with an unrelated key) or we're in `Multi`
                // mode and the lane turned out already-equal — either way,
                // re-ballot the same window before giving up on it.
                _ => continue,
            }
        }
    }

    event::capacity_exceeded(key);
    panic!(
        "accel_hash: table capacity exceeded — no empty or matching slot found \
         after probing all windows; this is undefined per the engine's capacity \
         precondition (insert beyond capacity)"
    );
}

/// §4.5 step 4: find/contains, terminating at the first empty slot seen.
pub fn probe_find<const W: usize, P: ProbingScheme>(
    storage: &Storage<W>,
    scheme: &P,
    hash: u64,
    key: u64,
    empty_key: u64,
    erased_key: Option<u64>,
) -> GroupFindOutcome {
    for window_index in attempts(storage, scheme, hash) {
        let window = storage.window(window_index);
        let ballot = ballot(window, key, empty_key, erased_key);
        if let Some(lane) = ballot.match_index {
            let payload = window.slots()[lane].load_payload(Ordering::Acquire);
            return GroupFindOutcome::Found(payload);
        }
        if ballot.saw_empty {
            return GroupFindOutcome::NotFound;
        }
    }
    GroupFindOutcome::NotFound
}

/// Like [`probe_find`] but tallies every matching slot along the full probe
/// sequence instead of stopping at the first one — used by `count`/
/// `count_outer` in [`crate::mode::Mode::Multi`].
pub fn probe_count<const W: usize, P: ProbingScheme>(
    storage: &Storage<W>,
    scheme: &P,
    hash: u64,
    key: u64,
    empty_key: u64,
    erased_key: Option<u64>,
) -> u64 {
    let mut count = 0u64;
    for window_index in attempts(storage, scheme, hash) {
        let window = storage.window(window_index);
        let mut saw_empty = false;
        for slot in window.slots() {
            let observed = slot.load_key(Ordering::Acquire);
            match RawSlot::classify(observed, empty_key, erased_key) {
                SlotState::Filled if observed == key => count += 1,
                SlotState::Empty => saw_empty = true,
                _ => {}
            }
        }
        if saw_empty {
            return count;
        }
    }
    count
}

/// §4.5 step 6: erase, symmetric with insert's tie-break rule.
pub fn probe_erase<const W: usize, P: ProbingScheme>(
    storage: &Storage<W>,
    scheme: &P,
    hash: u64,
    key: u64,
    empty_key: u64,
    erased_key: u64,
) -> GroupEraseOutcome {
    for window_index in attempts(storage, scheme, hash) {
        let window = storage.window(window_index);
        loop {
            let ballot = ballot(window, key, empty_key, Some(erased_key));
            let Some(lane) = ballot.match_index else {
                if ballot.saw_empty {
                    return GroupEraseOutcome::NotFound;
                }
                break;
            };
            let slot = &window.slots()[lane];
            match protocol::erase_slot(slot, key, empty_key, erased_key) {
                protocol::EraseOutcome::Erased => return GroupEraseOutcome::Erased,
                protocol::EraseOutcome::NotFound => return GroupEraseOutcome::NotFound,
                protocol::EraseOutcome::Continue => continue,
            }
        }
    }
    GroupEraseOutcome::NotFound
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probing::LinearProbing;

    const EMPTY: u64 = u64::MAX;
    const ERASED: u64 = u64::MAX - 1;

    #[test]
    fn insert_find_erase_through_group_loop() {
        let storage = Storage::<4>::new(4, EMPTY);
        let scheme = LinearProbing;

        assert_eq!(
            probe_insert(&storage, &scheme, 7, 7, 70, EMPTY, Some(ERASED), Mode::Unique),
            GroupInsertOutcome::Inserted
        );
        assert_eq!(
            probe_insert(&storage, &scheme, 7, 7, 999, EMPTY, Some(ERASED), Mode::Unique),
            GroupInsertOutcome::Present
        );
        assert_eq!(
            probe_find(&storage, &scheme, 7, 7, EMPTY, Some(ERASED)),
            GroupFindOutcome::Found(70)
        );
        assert_eq!(
            probe_find(&storage, &scheme, 99, 99, EMPTY, Some(ERASED)),
            GroupFindOutcome::NotFound
        );
        assert_eq!(
            probe_erase(&storage, &scheme, 7, 7, EMPTY, ERASED),
            GroupEraseOutcome::Erased
        );
        assert_eq!(
            probe_find(&storage, &scheme, 7, 7, EMPTY, Some(ERASED)),
            GroupFindOutcome::NotFound
        );
        // Tombstone transparency: the slot behind the erased one must
        // still be reachable.
        assert_eq!(
            probe_insert(&storage, &scheme, 7, 7, 71, EMPTY, Some(ERASED), Mode::Unique),
            GroupInsertOutcome::Inserted
        );
        assert_eq!(
            probe_find(&storage, &scheme, 7, 7, EMPTY, Some(ERASED)),
            GroupFindOutcome::Found(71)
        );
    }

    #[test]
    fn multimap_mode_allows_duplicates_and_counts_all() {
        let storage = Storage::<4>::new(4, EMPTY);
        let scheme = LinearProbing;

        for payload in [1u64, 2, 3] {
            assert_eq!(
                probe_insert(&storage, &scheme, 5, 5, payload, EMPTY, Some(ERASED), Mode::Multi),
                GroupInsertOutcome::Inserted
            );
        }
        assert_eq!(
            probe_count(&storage, &scheme, 5, 5, EMPTY, Some(ERASED)),
            3
        );
    }
}
