// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Model-based property test: every randomly generated sequence of
//! insert/erase operations against a `Table` must agree with a plain
//! `HashMap` oracle at each step, and the final `retrieve_all` must match
//! the oracle's contents exactly.
//!
//! Grounded on the `Model`/`Oracle` plus `check!().with_type::<Vec<Op>>()`
//! pattern in `dc/s2n-quic-dc/src/stream/recv/dispatch/tests.rs`.

use accel_hash::{Stream, Table};
use bolero::{check, TypeGenerator};
use std::{collections::HashMap, sync::Arc};

const EMPTY: u64 = u64::MAX;
const ERASED: u64 = u64::MAX - 1;

#[derive(Clone, Debug, TypeGenerator)]
enum Op {
    Insert { key: u8, value: u8 },
    Erase { key: u8 },
}

struct Model {
    table: Arc<Table<u64, u64, 4>>,
    stream: Stream,
    oracle: HashMap<u64, u64>,
}

impl Model {
    // Capacity comfortably covers every distinct `u8` key so a long op
    // sequence never hits the capacity-exceeded panic this engine defines
    // as undefined behavior.
    fn new() -> Self {
        Self {
            table: Arc::new(
                Table::<u64, u64, 4>::builder(512, EMPTY)
                    .with_erase(ERASED)
                    .build()
                    .unwrap(),
            ),
            stream: Stream::new(),
            oracle: HashMap::new(),
        }
    }

    fn apply(&mut self, op: &Op) {
        match *op {
            Op::Insert { key, value } => self.insert(key as u64, value as u64),
            Op::Erase { key } => self.erase(key as u64),
        }
    }

    fn insert(&mut self, key: u64, value: u64) {
        let was_present = self.oracle.contains_key(&key);
        let inserted = self
            .table
            .insert(&self.stream, vec![key], vec![value])
            .unwrap();
        assert_eq!(
            inserted,
            vec![!was_present],
            "insert outcome disagrees with oracle for key {key}"
        );
        // Matches `insert_slot`'s §4.4 semantics: a pre-existing key's value
        // is never overwritten by a later insert.
        self.oracle.entry(key).or_insert(value);
    }

    fn erase(&mut self, key: u64) {
        let was_present = self.oracle.remove(&key).is_some();
        let erased = self.table.erase(&self.stream, vec![key]).unwrap();
        assert_eq!(
            erased,
            vec![was_present],
            "erase outcome disagrees with oracle for key {key}"
        );
    }

    fn check_contains(&self, key: u64) {
        let contains = self.table.contains(&self.stream, vec![key]).unwrap();
        assert_eq!(contains, vec![self.oracle.contains_key(&key)]);
        if let Some(&expected) = self.oracle.get(&key) {
            assert_eq!(
                self.table.find(&self.stream, vec![key]).unwrap(),
                vec![Some(expected)]
            );
        }
    }

    fn check_retrieve_all(&self) {
        let (keys, values) = self.table.retrieve_all(&self.stream).unwrap();
        assert_eq!(keys.len(), self.oracle.len());
        let actual: HashMap<u64, u64> = keys.into_iter().zip(values).collect();
        assert_eq!(actual, self.oracle);
        assert_eq!(self.table.size(), self.oracle.len() as u64);
    }
}

#[test]
fn model_matches_hashmap_oracle() {
    check!().with_type::<Vec<Op>>().for_each(|ops| {
        let mut model = Model::new();
        for op in ops {
            let key = match *op {
                Op::Insert { key, .. } => key as u64,
                Op::Erase { key } => key as u64,
            };
            model.apply(op);
            model.check_contains(key);
        }
        model.check_retrieve_all();
    });
}
