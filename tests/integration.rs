// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Integration tests over the public `Table` API: the eight invariants and
//! six concrete scenarios from the engine's testable-properties section.

use accel_hash::{Mode, Stream, Table};
use std::sync::Arc;

const EMPTY: u64 = 0xFFFF_FFFF_FFFF_FFFF;
const ERASED: u64 = 0xFFFF_FFFF_FFFF_FFFE;

fn fresh_table(capacity: usize) -> Arc<Table<u64, u64, 4>> {
    Arc::new(
        Table::<u64, u64, 4>::builder(capacity, EMPTY)
            .with_erase(ERASED)
            .build()
            .unwrap(),
    )
}

#[test]
fn invariant_empty_on_clear() {
    let table = fresh_table(32);
    let stream = Stream::new();
    table
        .insert(&stream, vec![1, 2, 3], vec![10, 20, 30])
        .unwrap();
    table.clear();
    assert_eq!(table.size(), 0);
    let contains = table.contains(&stream, vec![1, 2, 3]).unwrap();
    assert!(contains.iter().all(|&b| !b));
}

#[test]
fn invariant_insert_then_contains() {
    let table = fresh_table(32);
    let stream = Stream::new();
    let keys = vec![1u64, 2, 3, 4, 5];
    let values = vec![10u64, 20, 30, 40, 50];
    table.insert(&stream, keys.clone(), values).unwrap();
    let contains = table.contains(&stream, keys).unwrap();
    assert!(contains.iter().all(|&b| b));
    let never_inserted = table.contains(&stream, vec![42]).unwrap();
    assert_eq!(never_inserted, vec![false]);
}

#[test]
fn invariant_no_duplicates() {
    let table = fresh_table(32);
    let stream = Stream::new();
    let keys = vec![7u64; 5];
    let values = vec![1u64, 2, 3, 4, 5];
    let inserted = table.insert(&stream, keys, values).unwrap();
    assert_eq!(inserted.iter().filter(|&&b| b).count(), 1);
    assert_eq!(table.size(), 1);
}

#[test]
fn invariant_erase_then_insert() {
    let table = fresh_table(32);
    let stream = Stream::new();
    table.insert(&stream, vec![9], vec![100]).unwrap();
    table.erase(&stream, vec![9]).unwrap();
    assert_eq!(table.contains(&stream, vec![9]).unwrap(), vec![false]);

    let inserted = table.insert(&stream, vec![9], vec![200]).unwrap();
    assert_eq!(inserted, vec![true]);
    assert_eq!(table.find(&stream, vec![9]).unwrap(), vec![Some(200)]);
}

#[test]
fn invariant_rehash_preservation() {
    let table = fresh_table(32);
    let stream = Stream::new();
    let keys: Vec<u64> = (0..10).collect();
    let values: Vec<u64> = (0..10).map(|v| v * 7).collect();
    table.insert(&stream, keys.clone(), values).unwrap();

    let size_before = table.size();
    table.rehash(&stream, 64).unwrap();
    assert_eq!(table.size(), size_before);
    assert!(table.contains(&stream, keys).unwrap().iter().all(|&b| b));
}

#[test]
fn invariant_retrieve_all_round_trip() {
    let table = fresh_table(32);
    let stream = Stream::new();
    let keys: Vec<u64> = (0..12).collect();
    let values: Vec<u64> = (0..12).map(|v| v + 1000).collect();
    table.insert(&stream, keys.clone(), values.clone()).unwrap();

    let (retrieved_keys, retrieved_values) = table.retrieve_all(&stream).unwrap();
    let mut expected: Vec<(u64, u64)> = keys.into_iter().zip(values).collect();
    let mut actual: Vec<(u64, u64)> = retrieved_keys.into_iter().zip(retrieved_values).collect();
    expected.sort_unstable();
    actual.sort_unstable();
    assert_eq!(expected, actual);
    assert_eq!(actual.len() as u64, table.size());
}

#[test]
fn invariant_tombstone_transparency() {
    // A near-full table (capacity 8, 6 live entries) forces probe sequences
    // to cross multiple windows; erasing an arbitrary key must not disturb
    // lookups for any other key still present, regardless of how the
    // probing scheme happened to place them relative to the tombstone.
    let table = fresh_table(8);
    let stream = Stream::new();
    let keys: Vec<u64> = (1..=6).collect();
    let values: Vec<u64> = keys.iter().map(|k| k * 10).collect();
    table.insert(&stream, keys.clone(), values.clone()).unwrap();

    table.erase(&stream, vec![3]).unwrap();

    for (&key, &value) in keys.iter().zip(values.iter()) {
        if key == 3 {
            assert_eq!(table.find(&stream, vec![key]).unwrap(), vec![None]);
        } else {
            assert_eq!(table.find(&stream, vec![key]).unwrap(), vec![Some(value)]);
        }
    }
}

#[test]
fn invariant_count_consistency_in_set_mode() {
    let table = fresh_table(32);
    let stream = Stream::new();
    let keys = vec![1u64, 2, 3, 4, 5];
    table
        .insert(&stream, keys.clone(), vec![0u64; 5])
        .unwrap();

    let query = vec![1u64, 2, 99, 4, 100];
    let expected: u64 = table
        .contains(&stream, query.clone())
        .unwrap()
        .iter()
        .filter(|&&b| b)
        .count() as u64;
    let counted = table.count_async(&stream, query).wait().unwrap();
    assert_eq!(counted, expected);
}

#[test]
fn scenarios_s1_through_s6() {
    let stream = Stream::new();
    let table = fresh_table(16);

    // S1: insert [1,2,3,4,5]
    let s1 = table
        .insert(&stream, vec![1, 2, 3, 4, 5], vec![1, 2, 3, 4, 5])
        .unwrap();
    assert_eq!(s1.iter().filter(|&&b| b).count(), 5);
    assert_eq!(table.size(), 5);
    assert_eq!(table.contains(&stream, vec![3]).unwrap(), vec![true]);
    assert_eq!(table.contains(&stream, vec![42]).unwrap(), vec![false]);

    // S2: insert [3,3,6]
    let s2 = table.insert(&stream, vec![3, 3, 6], vec![30, 31, 6]).unwrap();
    assert_eq!(s2.iter().filter(|&&b| b).count(), 1);
    assert_eq!(table.size(), 6);

    // S3: erase [2,4]; contains [1,2,3,4,5,6]
    table.erase(&stream, vec![2, 4]).unwrap();
    let s3 = table
        .contains(&stream, vec![1, 2, 3, 4, 5, 6])
        .unwrap();
    assert_eq!(s3, vec![true, false, true, false, true, true]);
    assert_eq!(table.size(), 4);

    // S4: insert [2] then find(2)
    let s4_inserted = table.insert(&stream, vec![2], vec![222]).unwrap();
    assert_eq!(s4_inserted, vec![true]);
    assert_eq!(table.find(&stream, vec![2]).unwrap(), vec![Some(222)]);
    assert_eq!(table.size(), 5);

    // S5: rehash to capacity=32
    table.rehash(&stream, 32).unwrap();
    assert_eq!(table.size(), 5);
    let live = [1u64, 2, 3, 5, 6];
    assert!(table
        .contains(&stream, live.to_vec())
        .unwrap()
        .iter()
        .all(|&b| b));

    // S6: retrieve_all
    let (retrieved_keys, _) = table.retrieve_all(&stream).unwrap();
    let mut actual = retrieved_keys;
    actual.sort_unstable();
    let mut expected = live.to_vec();
    expected.sort_unstable();
    assert_eq!(actual, expected);
}

#[test]
fn multimap_mode_relaxes_the_no_duplicates_invariant() {
    let table: Arc<Table<u64, u64, 4>> = Arc::new(
        Table::<u64, u64, 4>::builder(32, EMPTY)
            .with_erase(ERASED)
            .with_mode(Mode::Multi)
            .build()
            .unwrap(),
    );
    let stream = Stream::new();
    let keys = vec![5u64; 3];
    let values = vec![1u64, 2, 3];
    let inserted = table.insert(&stream, keys.clone(), values).unwrap();
    assert!(inserted.iter().all(|&b| b));

    let counts = table.count_outer_async(&stream, vec![5]).wait().unwrap();
    assert_eq!(counts, vec![3]);
}
