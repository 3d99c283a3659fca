// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use super::ProbingScheme;

/// `window = (h1 + attempt * h2) mod num_windows`, with `h2` forced odd.
///
/// `num_windows` is always a power of two (see [`super::make_window_extent`]),
/// and an odd stride is coprime with any power of two, so this visits every
/// residue in `[0, num_windows)` exactly once as `attempt` ranges over
/// `0..num_windows` — the same guarantee [`super::LinearProbing`] gets for
/// free, traded here for better collision spread under skewed hash inputs.
#[derive(Clone, Copy, Debug, Default)]
pub struct DoubleHashing;

impl ProbingScheme for DoubleHashing {
    const CG_SIZE: usize = 1;

    #[inline]
    fn window(&self, hash: u64, attempt: usize, num_windows: usize) -> usize {
        debug_assert!(num_windows.is_power_of_two());
        let h1 = hash as usize;
        // Fold the hash's upper bits into the stride and force it odd.
        let h2 = ((hash >> 32) as usize | 1) & (num_windows.wrapping_sub(1) | 1);
        let h2 = h2 | 1;
        (h1.wrapping_add(attempt.wrapping_mul(h2))) % num_windows
    }
}
