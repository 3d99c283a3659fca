// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Test-only helpers, enabled under `#[cfg(test)]` or the `testing` feature.
//! Grounded on the teacher's `Map::for_test_with_peers`/`test_insert`
//! pattern (`path/secret/map.rs`): small, deterministic builders that keep
//! integration tests from re-deriving table construction boilerplate.

use crate::{
    key::Key,
    probing::LinearProbing,
    table::{Table, TableBuilder},
    value::Value,
};
use std::sync::Arc;

/// Builds a table over `u64` keys/values with room for `capacity` entries,
/// erase enabled, and a fixed pair of sentinels so tests are reproducible
/// across runs.
pub fn test_table_u64(capacity: usize) -> Arc<Table<u64, u64, 4>> {
    Arc::new(
        Table::<u64, u64, 4>::builder(capacity, u64::MAX)
            .with_erase(u64::MAX - 1)
            .build()
            .expect("test table configuration is always valid"),
    )
}

/// Like [`test_table_u64`] but with a caller-chosen window width and probing
/// scheme, for tests that need to exercise a specific probing strategy.
pub fn test_table_with_scheme<const W: usize>(
    capacity: usize,
    scheme: LinearProbing,
) -> Arc<Table<u64, u64, W, LinearProbing>> {
    Arc::new(
        Table::<u64, u64, W>::builder(capacity, u64::MAX)
            .with_erase(u64::MAX - 1)
            .with_probing_scheme(scheme)
            .build()
            .expect("test table configuration is always valid"),
    )
}

/// A deterministic (not cryptographically random) sequence of distinct
/// `u64` keys starting at `start`, useful for bulk-insert test fixtures
/// that need a known key set without colliding with either sentinel.
pub fn sequential_keys(start: u64, count: usize) -> Vec<u64> {
    (0..count as u64).map(|i| start.wrapping_add(i)).collect()
}

/// Builds a table sized at `fraction` of `requested_capacity`'s worth of
/// headroom, for tests exercising near-full-capacity probing behavior.
pub fn test_table_at_load_factor<K: Key, V: Value, const W: usize>(
    requested_capacity: usize,
    load_factor: f64,
    empty_key: K,
    erased_key: K,
) -> Arc<Table<K, V, W>> {
    Arc::new(
        TableBuilder::<K, V, W>::new(requested_capacity, empty_key)
            .with_erase(erased_key)
            .with_load_factor(load_factor)
            .build()
            .expect("test table configuration is always valid"),
    )
}
