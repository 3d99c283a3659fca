// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The device-allocator capability (§6): scratch-buffer storage for
//! `retrieve_all`'s output and `rehash`'s replacement `Storage<W>`. Out of
//! scope as a specification — shipped here as a trait plus one default
//! implementation, generalized from the teacher's segment-allocator
//! abstraction (`src/allocator.rs`) from network buffers to plain scratch
//! bytes/slots.

/// A capability for acquiring and releasing scratch buffers on behalf of the
/// engine. Consumed as a generic parameter, never as `dyn Allocator`, so the
/// hot path never pays for virtual dispatch (Design Notes: capability
/// abstraction over dyn dispatch).
pub trait DeviceAllocator: Send + Sync {
    /// Allocates a zeroed buffer of `len` elements.
    fn alloc_u64(&self, len: usize) -> Vec<u64>;

    /// Allocates a buffer of `len` elements, each initialized to `fill`.
    fn alloc_u64_filled(&self, len: usize, fill: u64) -> Vec<u64> {
        vec![fill; len]
    }
}

/// The default allocator: ordinary heap allocation via the global allocator.
/// Analogous to the teacher's default `Allocator` impls backed by `Vec<u8>`
/// rather than a pooled/registered buffer (`src/allocator.rs`'s `get`/
/// `get_mut` accessors into a plain `Vec<u8>`).
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemAllocator;

impl DeviceAllocator for SystemAllocator {
    fn alloc_u64(&self, len: usize) -> Vec<u64> {
        vec![0u64; len]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeroed_by_default() {
        let a = SystemAllocator;
        assert_eq!(a.alloc_u64(4), vec![0, 0, 0, 0]);
    }

    #[test]
    fn filled_uses_requested_value() {
        let a = SystemAllocator;
        assert_eq!(a.alloc_u64_filled(3, 9), vec![9, 9, 9]);
    }
}
