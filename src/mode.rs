// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The multimap supplement (SPEC_FULL §4): invariant 3 ("no two filled slots
//! share an equivalent key... multimap mode relaxes this") left the relaxed
//! behavior unspecified. `Mode` makes the two behaviors explicit.

/// Controls whether insert enforces the one-key-one-slot invariant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Mode {
    /// Invariant 3 as written: inserting an already-present key returns
    /// `present` rather than occupying a second slot.
    #[default]
    Unique,
    /// Invariant 3 relaxed: duplicate keys may occupy distinct slots.
    /// `count`/`count_outer` walk the full probe sequence instead of
    /// stopping at the first match.
    Multi,
}
