// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Error taxonomy, split the way the spec's error-handling design splits it:
//! configuration errors are raised synchronously at the offending call site,
//! backend errors are raised at the nearest stream synchronization point.

/// Raised synchronously from a [`crate::table::Table`] constructor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Load factor must lie in `(0, 1]`.
    #[error("load factor {0} is not in (0, 1]")]
    InvalidLoadFactor(f64),

    /// The erased-key sentinel must differ from the empty-key sentinel
    /// whenever erase is enabled (invariant 2 of the data model).
    #[error("erased-key sentinel collides with the empty-key sentinel")]
    SentinelCollision,

    /// Requested capacity is zero; no window extent can be computed.
    #[error("capacity must be greater than zero")]
    ZeroCapacity,

    /// The probing scheme's compile-time cooperative-group size does not
    /// evenly divide (or get evenly divided by) the window width.
    #[error("probing scheme group size {group_size} is incompatible with window width {window_width}")]
    ProbingSchemeMismatch {
        group_size: usize,
        window_width: usize,
    },
}

/// Raised from [`crate::stream::Handle::wait`] / [`crate::stream::Stream::wait`]
/// when a submitted job could not run to completion.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// A job submitted to a [`crate::stream::Stream`] panicked; the panic
    /// payload (if a string) is preserved for diagnostics.
    #[error("stream job panicked: {0}")]
    JobPanicked(String),

    /// The stream's worker thread has already shut down (e.g. the `Stream`
    /// was dropped while a job was in flight).
    #[error("stream worker is no longer running")]
    StreamClosed,
}
