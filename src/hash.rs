// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The hash functor contract (§6, out of scope as a *specification* but
//! shipped here as a default so the table is constructible): deterministic
//! within one process, collision-tolerant. Grounded on the teacher's use of
//! `ahash`/`hash_one` in `PeerMap::hash_key` (`path/secret/map/state.rs`).

use crate::key::Key;
use std::hash::{BuildHasher, Hasher};

/// Maps a key to a 64-bit fingerprint consumed by the probing scheme.
pub trait KeyHasher<K: Key>: Send + Sync {
    fn hash(&self, key: K) -> u64;
}

/// The default hash functor: `ahash`, seeded once per table instance (not
/// per process) so probing sequences are reproducible across operations on
/// the same table, as the probing contract in §6 requires ("deterministic").
#[derive(Clone)]
pub struct AHashKeyHasher {
    state: ahash::RandomState,
}

impl AHashKeyHasher {
    pub fn new() -> Self {
        // Fixed seeds rather than `ahash::RandomState::new()`'s per-process
        // entropy: two tables constructed the same way must probe the same
        // way, which the random-per-process default would violate.
        Self {
            state: ahash::RandomState::with_seeds(
                0x9E37_79B9_7F4A_7C15,
                0xC2B2_AE3D_27D4_EB4F,
                0x1656_67B1_9E37_79F9,
                0xFF51_AFD7_ED55_8CCD,
            ),
        }
    }
}

impl Default for AHashKeyHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Key> KeyHasher<K> for AHashKeyHasher {
    #[inline]
    fn hash(&self, key: K) -> u64 {
        let mut hasher = self.state.build_hasher();
        hasher.write_u64(key.to_bits());
        hasher.finish()
    }
}
