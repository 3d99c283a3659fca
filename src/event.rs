// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Instrumentation at construction, rehash, and error paths, the way the
//! teacher logs around its own map state transitions (`tracing::warn!` in
//! `path/secret/map/state.rs`). This is intentionally a thin set of
//! `tracing` call sites rather than the teacher's full codegen'd
//! event-subscriber framework (`s2n-quic-dc`'s `event` module), which is out
//! of proportion to this crate's size.

use crate::error::BackendError;

pub fn table_constructed(capacity: usize, num_windows: usize, window_width: usize) {
    tracing::debug!(capacity, num_windows, window_width, "table constructed");
}

pub fn rehash_started(old_capacity: usize, new_capacity: usize) {
    tracing::info!(old_capacity, new_capacity, "rehash started");
}

pub fn rehash_completed(new_capacity: usize, entries_moved: usize) {
    tracing::info!(new_capacity, entries_moved, "rehash completed");
}

pub fn job_panicked(error: &BackendError) {
    tracing::warn!(%error, "stream job panicked");
}

pub fn capacity_exceeded(attempted_key_bits: u64) {
    tracing::warn!(key_bits = attempted_key_bits, "insert exceeded table capacity");
}
