// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The bulk operation dispatcher (C6): fans a host-provided key (and, for
//! insert, value) slice out across worker lanes — the host-visible analogue
//! of launching a cooperative-group kernel over a grid. Each lane owns a
//! disjoint, contiguous slice of the input (and output) so no cross-lane
//! synchronization is needed beyond the atomic CAS already inside
//! [`crate::group`]; the `_if` variants additionally honor a boolean
//! stencil, skipping lanes whose stencil entry is `false`.
//!
//! Grounded on §4.6; the fan-out itself uses `std::thread::scope`, which has
//! no direct analogue in the teacher crate (its concurrency is tokio-driven)
//! but is the idiomatic data-parallel primitive for this engine's
//! synchronous-bulk-over-a-slice shape.

use crate::{
    group::{self, GroupEraseOutcome, GroupFindOutcome, GroupInsertOutcome},
    hash::KeyHasher,
    key::Key,
    mode::Mode,
    probing::ProbingScheme,
    sentinel::Sentinels,
    storage::Storage,
    value::Value,
};
use std::sync::atomic::{AtomicU64, Ordering};

fn num_lanes(len: usize) -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    cpus.min(len.max(1))
}

/// Splits `[0, len)` into `lanes` nearly-equal contiguous ranges.
fn chunk_bounds(len: usize, lanes: usize) -> Vec<(usize, usize)> {
    let base = len / lanes;
    let rem = len % lanes;
    let mut bounds = Vec::with_capacity(lanes);
    let mut start = 0;
    for i in 0..lanes {
        let extra = usize::from(i < rem);
        let end = start + base + extra;
        bounds.push((start, end));
        start = end;
    }
    bounds
}

/// Splits a mutable output slice into the same contiguous ranges as
/// [`chunk_bounds`], so each lane writes into a disjoint output region.
fn split_by_bounds<'a, T>(slice: &'a mut [T], bounds: &[(usize, usize)]) -> Vec<&'a mut [T]> {
    let mut rest = slice;
    let mut out = Vec::with_capacity(bounds.len());
    for &(start, end) in bounds {
        let (chunk, tail) = rest.split_at_mut(end - start);
        out.push(chunk);
        rest = tail;
    }
    out
}

/// §4.6 `insert[_if][_async]`: inserts `keys[i]`/`values[i]` unless
/// `stencil` is present and `stencil[i]` is `false`. `out_inserted[i]` is
/// `true` iff this call newly occupied a slot for `keys[i]`.
#[allow(clippy::too_many_arguments)]
pub fn bulk_insert<K, V, const W: usize, P, H>(
    storage: &Storage<W>,
    scheme: &P,
    hasher: &H,
    sentinels: &Sentinels<K>,
    mode: Mode,
    size: &AtomicU64,
    keys: &[K],
    values: &[V],
    stencil: Option<&[bool]>,
    out_inserted: &mut [bool],
) where
    K: Key,
    V: Value,
    P: ProbingScheme,
    H: KeyHasher<K>,
{
    assert_eq!(keys.len(), values.len());
    assert_eq!(keys.len(), out_inserted.len());
    let lanes = num_lanes(keys.len());
    let bounds = chunk_bounds(keys.len(), lanes);
    let out_chunks = split_by_bounds(out_inserted, &bounds);

    std::thread::scope(|s| {
        for ((start, end), out_chunk) in bounds.iter().copied().zip(out_chunks) {
            let keys = &keys[start..end];
            let values = &values[start..end];
            let stencil_chunk = stencil.map(|st| &st[start..end]);
            s.spawn(move || {
                for (i, (&key, &value)) in keys.iter().zip(values.iter()).enumerate() {
                    if let Some(st) = stencil_chunk {
                        if !st[i] {
                            out_chunk[i] = false;
                            continue;
                        }
                    }
                    let hash = hasher.hash(key);
                    let outcome = group::probe_insert(
                        storage,
                        scheme,
                        hash,
                        key.to_bits(),
                        value.to_bits(),
                        sentinels.empty_key_bits(),
                        sentinels.erased_key_bits(),
                        mode,
                    );
                    let inserted = matches!(outcome, GroupInsertOutcome::Inserted);
                    if inserted {
                        size.fetch_add(1, Ordering::Relaxed);
                    }
                    out_chunk[i] = inserted;
                }
            });
        }
    });
}

/// §4.6 `erase_async`: erases `keys[i]` if present. `out_erased[i]` is
/// `true` iff a slot was tombstoned for `keys[i]`.
pub fn bulk_erase<K, const W: usize, P, H>(
    storage: &Storage<W>,
    scheme: &P,
    hasher: &H,
    sentinels: &Sentinels<K>,
    size: &AtomicU64,
    keys: &[K],
    out_erased: &mut [bool],
) where
    K: Key,
    P: ProbingScheme,
    H: KeyHasher<K>,
{
    assert_eq!(keys.len(), out_erased.len());
    let erased_key = sentinels
        .erased_key_bits()
        .expect("erase_async requires an erased-key sentinel");
    let lanes = num_lanes(keys.len());
    let bounds = chunk_bounds(keys.len(), lanes);
    let out_chunks = split_by_bounds(out_erased, &bounds);

    std::thread::scope(|s| {
        for ((start, end), out_chunk) in bounds.iter().copied().zip(out_chunks) {
            let keys = &keys[start..end];
            s.spawn(move || {
                for (i, &key) in keys.iter().enumerate() {
                    let hash = hasher.hash(key);
                    let outcome = group::probe_erase(
                        storage,
                        scheme,
                        hash,
                        key.to_bits(),
                        sentinels.empty_key_bits(),
                        erased_key,
                    );
                    let erased = matches!(outcome, GroupEraseOutcome::Erased);
                    if erased {
                        size.fetch_sub(1, Ordering::Relaxed);
                    }
                    out_chunk[i] = erased;
                }
            });
        }
    });
}

/// §4.6 `contains[_if]_async`.
pub fn bulk_contains<K, const W: usize, P, H>(
    storage: &Storage<W>,
    scheme: &P,
    hasher: &H,
    sentinels: &Sentinels<K>,
    keys: &[K],
    stencil: Option<&[bool]>,
    out_contains: &mut [bool],
) where
    K: Key,
    P: ProbingScheme,
    H: KeyHasher<K>,
{
    assert_eq!(keys.len(), out_contains.len());
    let lanes = num_lanes(keys.len());
    let bounds = chunk_bounds(keys.len(), lanes);
    let out_chunks = split_by_bounds(out_contains, &bounds);

    std::thread::scope(|s| {
        for ((start, end), out_chunk) in bounds.iter().copied().zip(out_chunks) {
            let keys = &keys[start..end];
            let stencil_chunk = stencil.map(|st| &st[start..end]);
            s.spawn(move || {
                for (i, &key) in keys.iter().enumerate() {
                    if let Some(st) = stencil_chunk {
                        if !st[i] {
                            out_chunk[i] = false;
                            continue;
                        }
                    }
                    let hash = hasher.hash(key);
                    let outcome = group::probe_find(
                        storage,
                        scheme,
                        hash,
                        key.to_bits(),
                        sentinels.empty_key_bits(),
                        sentinels.erased_key_bits(),
                    );
                    out_chunk[i] = matches!(outcome, GroupFindOutcome::Found(_));
                }
            });
        }
    });
}

/// §4.6 `find_async`.
pub fn bulk_find<K, V, const W: usize, P, H>(
    storage: &Storage<W>,
    scheme: &P,
    hasher: &H,
    sentinels: &Sentinels<K>,
    keys: &[K],
    out_values: &mut [Option<V>],
) where
    K: Key,
    V: Value,
    P: ProbingScheme,
    H: KeyHasher<K>,
{
    assert_eq!(keys.len(), out_values.len());
    let lanes = num_lanes(keys.len());
    let bounds = chunk_bounds(keys.len(), lanes);
    let out_chunks = split_by_bounds(out_values, &bounds);

    std::thread::scope(|s| {
        for ((start, end), out_chunk) in bounds.iter().copied().zip(out_chunks) {
            let keys = &keys[start..end];
            s.spawn(move || {
                for (i, &key) in keys.iter().enumerate() {
                    let hash = hasher.hash(key);
                    let outcome = group::probe_find(
                        storage,
                        scheme,
                        hash,
                        key.to_bits(),
                        sentinels.empty_key_bits(),
                        sentinels.erased_key_bits(),
                    );
                    out_chunk[i] = match outcome {
                        GroupFindOutcome::Found(payload) => Some(V::from_bits(payload)),
                        GroupFindOutcome::NotFound => None,
                    };
                }
            });
        }
    });
}

/// §4.6 `insert_and_find_async`: inserts if absent, then reports both
/// whether this call performed the insertion and the value now on record
/// for the key (the one just inserted, or the pre-existing one).
#[allow(clippy::too_many_arguments)]
pub fn bulk_insert_and_find<K, V, const W: usize, P, H>(
    storage: &Storage<W>,
    scheme: &P,
    hasher: &H,
    sentinels: &Sentinels<K>,
    size: &AtomicU64,
    keys: &[K],
    values: &[V],
    out: &mut [(bool, V)],
) where
    K: Key,
    V: Value,
    P: ProbingScheme,
    H: KeyHasher<K>,
{
    assert_eq!(keys.len(), values.len());
    assert_eq!(keys.len(), out.len());
    let lanes = num_lanes(keys.len());
    let bounds = chunk_bounds(keys.len(), lanes);
    let out_chunks = split_by_bounds(out, &bounds);

    std::thread::scope(|s| {
        for ((start, end), out_chunk) in bounds.iter().copied().zip(out_chunks) {
            let keys = &keys[start..end];
            let values = &values[start..end];
            s.spawn(move || {
                for (i, (&key, &value)) in keys.iter().zip(values.iter()).enumerate() {
                    let hash = hasher.hash(key);
                    let outcome = group::probe_insert(
                        storage,
                        scheme,
                        hash,
                        key.to_bits(),
                        value.to_bits(),
                        sentinels.empty_key_bits(),
                        sentinels.erased_key_bits(),
                        Mode::Unique,
                    );
                    let inserted = matches!(outcome, GroupInsertOutcome::Inserted);
                    if inserted {
                        size.fetch_add(1, Ordering::Relaxed);
                        out_chunk[i] = (true, value);
                        continue;
                    }
                    let found = group::probe_find(
                        storage,
                        scheme,
                        hash,
                        key.to_bits(),
                        sentinels.empty_key_bits(),
                        sentinels.erased_key_bits(),
                    );
                    out_chunk[i] = match found {
                        GroupFindOutcome::Found(payload) => (false, V::from_bits(payload)),
                        // Raced with a concurrent erase between the insert
                        // attempt and this lookup; report the value we tried
                        // to insert, matching the caller's intent.
                        GroupFindOutcome::NotFound => (false, value),
                    };
                }
            });
        }
    });
}

/// The raw per-key match count along the full probe sequence: `0` if `key`
/// is absent, `1` in [`Mode::Unique`] if present (at most one slot can
/// match), or the number of occupied slots sharing `key` in [`Mode::Multi`].
/// Shared by both [`bulk_count`] (plain) and [`bulk_count_outer`] (which
/// additionally maps `0` to `1`).
#[inline]
fn match_count<K, const W: usize, P, H>(
    storage: &Storage<W>,
    scheme: &P,
    hasher: &H,
    sentinels: &Sentinels<K>,
    mode: Mode,
    key: K,
) -> u64
where
    K: Key,
    P: ProbingScheme,
    H: KeyHasher<K>,
{
    let hash = hasher.hash(key);
    match mode {
        Mode::Unique => u64::from(matches!(
            group::probe_find(
                storage,
                scheme,
                hash,
                key.to_bits(),
                sentinels.empty_key_bits(),
                sentinels.erased_key_bits(),
            ),
            GroupFindOutcome::Found(_)
        )),
        Mode::Multi => group::probe_count(
            storage,
            scheme,
            hash,
            key.to_bits(),
            sentinels.empty_key_bits(),
            sentinels.erased_key_bits(),
        ),
    }
}

/// §4.6 `count`/`count_async`: per-key match count, `0` for an absent key —
/// testable property 8's `Σ contains(k) ? 1 : 0` in [`Mode::Unique`], the
/// full duplicate tally in [`Mode::Multi`].
pub fn bulk_count<K, const W: usize, P, H>(
    storage: &Storage<W>,
    scheme: &P,
    hasher: &H,
    sentinels: &Sentinels<K>,
    mode: Mode,
    keys: &[K],
    out_counts: &mut [u64],
) where
    K: Key,
    P: ProbingScheme,
    H: KeyHasher<K>,
{
    assert_eq!(keys.len(), out_counts.len());
    let lanes = num_lanes(keys.len());
    let bounds = chunk_bounds(keys.len(), lanes);
    let out_chunks = split_by_bounds(out_counts, &bounds);

    std::thread::scope(|s| {
        for ((start, end), out_chunk) in bounds.iter().copied().zip(out_chunks) {
            let keys = &keys[start..end];
            s.spawn(move || {
                for (i, &key) in keys.iter().enumerate() {
                    out_chunk[i] = match_count(storage, scheme, hasher, sentinels, mode, key);
                }
            });
        }
    });
}

/// §4.6 `count_outer`: like [`bulk_count`], except an absent key counts as
/// `1` instead of `0` (§6: "count_outer counts non-matches as 1"). In
/// [`Mode::Unique`] every key therefore contributes exactly `1` — the
/// per-key count collapses to the input length (see `DESIGN.md`'s Open
/// Question resolution).
pub fn bulk_count_outer<K, const W: usize, P, H>(
    storage: &Storage<W>,
    scheme: &P,
    hasher: &H,
    sentinels: &Sentinels<K>,
    mode: Mode,
    keys: &[K],
    out_counts: &mut [u64],
) where
    K: Key,
    P: ProbingScheme,
    H: KeyHasher<K>,
{
    assert_eq!(keys.len(), out_counts.len());
    let lanes = num_lanes(keys.len());
    let bounds = chunk_bounds(keys.len(), lanes);
    let out_chunks = split_by_bounds(out_counts, &bounds);

    std::thread::scope(|s| {
        for ((start, end), out_chunk) in bounds.iter().copied().zip(out_chunks) {
            let keys = &keys[start..end];
            s.spawn(move || {
                for (i, &key) in keys.iter().enumerate() {
                    let count = match_count(storage, scheme, hasher, sentinels, mode, key);
                    out_chunk[i] = if count == 0 { 1 } else { count };
                }
            });
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{hash::AHashKeyHasher, probing::LinearProbing};

    fn fixture(capacity: usize) -> (Storage<4>, LinearProbing, AHashKeyHasher, Sentinels<u64>) {
        let num_windows = crate::probing::make_window_extent(capacity, 4);
        (
            Storage::<4>::new(num_windows, u64::MAX),
            LinearProbing,
            AHashKeyHasher::new(),
            Sentinels::with_erase(u64::MAX, u64::MAX - 1).unwrap(),
        )
    }

    #[test]
    fn bulk_insert_then_contains_then_find() {
        let (storage, scheme, hasher, sentinels) = fixture(64);
        let size = AtomicU64::new(0);
        let keys: Vec<u64> = (0..32).collect();
        let values: Vec<u64> = (100..132).collect();
        let mut inserted = vec![false; keys.len()];
        bulk_insert(
            &storage, &scheme, &hasher, &sentinels, Mode::Unique, &size, &keys, &values, None,
            &mut inserted,
        );
        assert!(inserted.iter().all(|&b| b));
        assert_eq!(size.load(Ordering::Relaxed), 32);

        let mut contains = vec![false; keys.len()];
        bulk_contains(&storage, &scheme, &hasher, &sentinels, &keys, None, &mut contains);
        assert!(contains.iter().all(|&b| b));

        let mut found: Vec<Option<u64>> = vec![None; keys.len()];
        bulk_find(&storage, &scheme, &hasher, &sentinels, &keys, &mut found);
        assert_eq!(found, values.into_iter().map(Some).collect::<Vec<_>>());
    }

    #[test]
    fn bulk_erase_then_reinsert_and_stencil_skips() {
        let (storage, scheme, hasher, sentinels) = fixture(64);
        let size = AtomicU64::new(0);
        let keys: Vec<u64> = (0..16).collect();
        let values: Vec<u64> = vec![1; 16];
        let mut inserted = vec![false; keys.len()];
        bulk_insert(
            &storage, &scheme, &hasher, &sentinels, Mode::Unique, &size, &keys, &values, None,
            &mut inserted,
        );

        let mut erased = vec![false; keys.len()];
        bulk_erase(&storage, &scheme, &hasher, &sentinels, &size, &keys, &mut erased);
        assert!(erased.iter().all(|&b| b));
        assert_eq!(size.load(Ordering::Relaxed), 0);

        let stencil = vec![true, false].repeat(8);
        let mut reinserted = vec![false; keys.len()];
        bulk_insert(
            &storage,
            &scheme,
            &hasher,
            &sentinels,
            Mode::Unique,
            &size,
            &keys,
            &values,
            Some(&stencil),
            &mut reinserted,
        );
        assert_eq!(reinserted, stencil);
        assert_eq!(size.load(Ordering::Relaxed), 8);
    }

    #[test]
    fn count_outer_in_multi_mode_tallies_all_matches() {
        let (storage, scheme, hasher, sentinels) = fixture(64);
        let size = AtomicU64::new(0);
        let keys = vec![5u64; 3];
        let values = vec![1u64, 2, 3];
        let mut inserted = vec![false; keys.len()];
        bulk_insert(
            &storage, &scheme, &hasher, &sentinels, Mode::Multi, &size, &keys, &values, None,
            &mut inserted,
        );
        assert!(inserted.iter().all(|&b| b));

        let query = vec![5u64];
        let mut counts = vec![0u64; 1];
        bulk_count_outer(&storage, &scheme, &hasher, &sentinels, Mode::Multi, &query, &mut counts);
        assert_eq!(counts, vec![3]);
    }

    #[test]
    fn count_outer_counts_absent_keys_as_one() {
        let (storage, scheme, hasher, sentinels) = fixture(64);
        let size = AtomicU64::new(0);
        bulk_insert(
            &storage, &scheme, &hasher, &sentinels, Mode::Unique, &size, &[1u64],
            &[10u64], None, &mut [false],
        );

        // Mode::Unique: every key (present or absent) contributes exactly
        // 1 to count_outer; the per-key counts collapse to the input
        // length, unlike plain `count` which would report [1, 0].
        let query = vec![1u64, 2u64];
        let mut outer_counts = vec![0u64; 2];
        bulk_count_outer(
            &storage, &scheme, &hasher, &sentinels, Mode::Unique, &query, &mut outer_counts,
        );
        assert_eq!(outer_counts, vec![1, 1]);

        let mut plain_counts = vec![0u64; 2];
        bulk_count(&storage, &scheme, &hasher, &sentinels, Mode::Unique, &query, &mut plain_counts);
        assert_eq!(plain_counts, vec![1, 0]);
    }

    #[test]
    fn count_outer_counts_absent_key_as_one_in_multi_mode() {
        let (storage, scheme, hasher, sentinels) = fixture(64);

        let query = vec![99u64];
        let mut outer_counts = vec![0u64; 1];
        bulk_count_outer(
            &storage, &scheme, &hasher, &sentinels, Mode::Multi, &query, &mut outer_counts,
        );
        assert_eq!(outer_counts, vec![1]);

        let mut plain_counts = vec![0u64; 1];
        bulk_count(&storage, &scheme, &hasher, &sentinels, Mode::Multi, &query, &mut plain_counts);
        assert_eq!(plain_counts, vec![0]);
    }

    #[test]
    fn multi_mode_duplicates_pack_into_the_same_window_before_advancing() {
        // Window width 4: three copies of the same key must all land in
        // window 0 (the match in lane 0 must not stop the ballot from
        // reporting a reusable lane among 1-3), and `probe_count` must
        // then tally all three rather than stopping after the first.
        let (storage, scheme, hasher, sentinels) = fixture(4);
        let size = AtomicU64::new(0);
        let keys = vec![7u64; 3];
        let values = vec![1u64, 2, 3];
        let mut inserted = vec![false; keys.len()];
        bulk_insert(
            &storage, &scheme, &hasher, &sentinels, Mode::Multi, &size, &keys, &values, None,
            &mut inserted,
        );
        assert!(inserted.iter().all(|&b| b));
        assert_eq!(storage.count_filled(sentinels.empty_key_bits(), sentinels.erased_key_bits()), 3);

        let query = vec![7u64];
        let mut counts = vec![0u64; 1];
        bulk_count(&storage, &scheme, &hasher, &sentinels, Mode::Multi, &query, &mut counts);
        assert_eq!(counts, vec![3]);
    }
}
