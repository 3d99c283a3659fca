// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Key width precondition (§6): keys must be bitwise-comparable and fit in 64
//! bits, so that a slot's key half is a single synchronizing `AtomicU64`.

use std::fmt;

/// A key usable in a [`crate::table::Table`].
///
/// Distinct in-memory representations must imply distinct keys: `to_bits`
/// must be injective over the set of keys the caller intends to insert.
pub trait Key: Copy + Eq + Send + Sync + fmt::Debug + 'static {
    fn to_bits(self) -> u64;
    fn from_bits(bits: u64) -> Self;
}

macro_rules! impl_key_for_int {
    ($($t:ty),* $(,)?) => {
        $(
            impl Key for $t {
                #[inline]
                fn to_bits(self) -> u64 {
                    self as u64
                }

                #[inline]
                fn from_bits(bits: u64) -> Self {
                    bits as $t
                }
            }
        )*
    };
}

impl_key_for_int!(u8, u16, u32, u64, i8, i16, i32, i64, usize, isize);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        assert_eq!(u64::from_bits(42u64.to_bits()), 42u64);
        assert_eq!(i32::from_bits((-7i32).to_bits()), -7i32);
    }
}
