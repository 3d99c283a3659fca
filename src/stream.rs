// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The host-managed command stream (§5/§6): a totally ordered FIFO queue
//! with a `wait()` barrier. Jobs submitted to the same `Stream` execute in
//! issue order (strict happens-before); different streams are mutually
//! unordered unless the caller synchronizes explicitly.
//!
//! Grounded on the lifecycle shape of the teacher's `Cleaner`
//! (`path/secret/map/cleaner.rs`): a dedicated background thread, an
//! `AtomicBool` stop flag, and a `Mutex<Option<JoinHandle<_>>>` so `Drop`
//! can join it cleanly. Here the thread drains a job queue instead of
//! running periodic maintenance.

use crate::{error::BackendError, event};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{Arc, Mutex},
    thread::JoinHandle,
};

type Job = Box<dyn FnOnce() + Send>;

struct Inner {
    sender: Sender<Job>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

/// A FIFO command stream. Cloning shares the same underlying worker thread
/// and queue — the analogue of the accelerator runtime's stream handle
/// being cheaply copyable while referring to one physical queue.
#[derive(Clone)]
pub struct Stream {
    inner: Arc<Inner>,
}

impl Default for Stream {
    fn default() -> Self {
        Self::new()
    }
}

impl Stream {
    /// Spawns the background worker thread that drains submitted jobs in
    /// order.
    pub fn new() -> Self {
        let (sender, receiver): (Sender<Job>, Receiver<Job>) = bounded(1024);
        let worker = std::thread::Builder::new()
            .name("accel-hash-stream".into())
            .spawn(move || {
                for job in receiver.iter() {
                    job();
                }
            })
            .expect("failed to spawn stream worker thread");

        Self {
            inner: Arc::new(Inner {
                sender,
                worker: Mutex::new(Some(worker)),
            }),
        }
    }

    /// Enqueues `f`, returning a [`Handle`] the caller can later `wait` on
    /// to observe `f`'s return value (or a [`BackendError`] if `f`
    /// panicked). Returns immediately — this is the stream-primitive half
    /// of every `_async` bulk operation in [`crate::dispatch`].
    pub fn submit<T, F>(&self, f: F) -> Handle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (result_tx, result_rx) = bounded(1);
        let job: Job = Box::new(move || {
            let outcome = catch_unwind(AssertUnwindSafe(f));
            let result = outcome.map_err(|payload| {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".to_string());
                BackendError::JobPanicked(message)
            });
            if let Err(err) = &result {
                event::job_panicked(err);
            }
            // The receiving `Handle` may have been dropped without
            // waiting; that's a legitimate fire-and-forget async submission
            // so a failed send here is not itself an error.
            let _ = result_tx.send(result);
        });

        match self.inner.sender.send(job) {
            Ok(()) => Handle { result_rx },
            Err(_) => {
                // Worker is gone; synthesize a handle that immediately
                // reports the stream as closed.
                let (tx, rx) = bounded(1);
                let _ = tx.send(Err(BackendError::StreamClosed));
                Handle { result_rx: rx }
            }
        }
    }

    /// Blocks until every job submitted to this stream before this call
    /// has completed — the stream's `wait()` barrier (§6).
    pub fn wait(&self) -> Result<(), BackendError> {
        self.submit(|| ()).wait()
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        // `self.sender` only drops after this function returns, so the
        // channel is still open here and the worker is still parked in
        // `receiver.iter()` — joining at this point would deadlock. Letting
        // the `JoinHandle` drop without joining detaches the thread; it
        // wakes on its own once `sender` drops right after we return and
        // exits its loop.
        self.worker.lock().unwrap_or_else(|e| e.into_inner()).take();
    }
}

/// A pending (or already-resolved) result of one job submitted to a
/// [`Stream`]. Async bulk operations return a `Handle<T>` immediately;
/// synchronous variants call [`Handle::wait`] before returning to the
/// caller, which is exactly how §4.6 describes the sync/async split.
pub struct Handle<T> {
    result_rx: crossbeam_channel::Receiver<Result<T, BackendError>>,
}

impl<T> Handle<T> {
    /// Blocks until the job completes, returning its result or the
    /// [`BackendError`] recorded if it panicked.
    pub fn wait(self) -> Result<T, BackendError> {
        self.result_rx.recv().map_err(|_| BackendError::StreamClosed)?
    }
}
