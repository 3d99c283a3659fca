// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The host-facing container (§6): wires storage, probing, hashing,
//! dispatch, rehash, and retrieve together behind one type. Async methods
//! take `self: &Arc<Self>` and hand a cloned `Arc` into the submitted job —
//! the same delegation shape as the teacher's `Map`, which wraps an
//! `Arc<dyn Store>` so cloning the handle is cheap and the backing state
//! outlives any one call (`path/secret/map.rs`).

use crate::{
    allocator::{DeviceAllocator, SystemAllocator},
    dispatch,
    error::ConfigError,
    event,
    hash::{AHashKeyHasher, KeyHasher},
    key::Key,
    mode::Mode,
    probing::{self, LinearProbing, ProbingScheme},
    rehash,
    retrieve,
    sentinel::Sentinels,
    storage::Storage,
    stream::{Handle, Stream},
    value::Value,
};
use parking_lot::RwLock;
use std::{
    marker::PhantomData,
    sync::{atomic::{AtomicU64, Ordering}, Arc},
};

/// Validated configuration for a [`Table`], built incrementally and
/// checked all at once in [`TableBuilder::build`] — the same
/// validate-at-construction shape as the teacher's PSK server builder
/// (`psk/server/builder.rs`).
pub struct TableBuilder<K, V, const W: usize, P = LinearProbing, H = AHashKeyHasher, A = SystemAllocator> {
    capacity: usize,
    load_factor: f64,
    empty_key: K,
    erased_key: Option<K>,
    mode: Mode,
    scheme: P,
    hasher: H,
    allocator: A,
    _marker: PhantomData<V>,
}

impl<K: Key, V: Value, const W: usize> TableBuilder<K, V, W, LinearProbing, AHashKeyHasher, SystemAllocator> {
    /// Starts a builder for at least `capacity` live entries, using the
    /// default probing scheme, hash functor, and allocator.
    pub fn new(capacity: usize, empty_key: K) -> Self {
        Self {
            capacity,
            load_factor: 1.0,
            empty_key,
            erased_key: None,
            mode: Mode::Unique,
            scheme: LinearProbing,
            hasher: AHashKeyHasher::new(),
            allocator: SystemAllocator,
            _marker: PhantomData,
        }
    }
}

impl<K: Key, V: Value, const W: usize, P, H, A> TableBuilder<K, V, W, P, H, A> {
    /// Enables erase by reserving `erased_key` as the tombstone sentinel
    /// (invariant 2: it must differ from the empty-key sentinel, checked in
    /// `build`).
    pub fn with_erase(mut self, erased_key: K) -> Self {
        self.erased_key = Some(erased_key);
        self
    }

    /// Requested load factor in `(0, 1]`; the window extent is chosen so
    /// that `capacity / load_factor` slots are available.
    pub fn with_load_factor(mut self, load_factor: f64) -> Self {
        self.load_factor = load_factor;
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_probing_scheme<P2: ProbingScheme>(self, scheme: P2) -> TableBuilder<K, V, W, P2, H, A> {
        TableBuilder {
            capacity: self.capacity,
            load_factor: self.load_factor,
            empty_key: self.empty_key,
            erased_key: self.erased_key,
            mode: self.mode,
            scheme,
            hasher: self.hasher,
            allocator: self.allocator,
            _marker: PhantomData,
        }
    }

    pub fn with_hasher<H2: KeyHasher<K>>(self, hasher: H2) -> TableBuilder<K, V, W, P, H2, A> {
        TableBuilder {
            capacity: self.capacity,
            load_factor: self.load_factor,
            empty_key: self.empty_key,
            erased_key: self.erased_key,
            mode: self.mode,
            scheme: self.scheme,
            hasher,
            allocator: self.allocator,
            _marker: PhantomData,
        }
    }

    pub fn with_allocator<A2: DeviceAllocator>(self, allocator: A2) -> TableBuilder<K, V, W, P, H, A2> {
        TableBuilder {
            capacity: self.capacity,
            load_factor: self.load_factor,
            empty_key: self.empty_key,
            erased_key: self.erased_key,
            mode: self.mode,
            scheme: self.scheme,
            hasher: self.hasher,
            allocator,
            _marker: PhantomData,
        }
    }
}

impl<K, V, const W: usize, P, H, A> TableBuilder<K, V, W, P, H, A>
where
    K: Key,
    V: Value,
    P: ProbingScheme,
    H: KeyHasher<K>,
    A: DeviceAllocator,
{
    /// Validates the configuration and allocates storage. Fails with
    /// [`ConfigError`] rather than panicking, per §7's synchronous
    /// configuration-error path.
    pub fn build(self) -> Result<Table<K, V, W, P, H, A>, ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if !(self.load_factor > 0.0 && self.load_factor <= 1.0) {
            return Err(ConfigError::InvalidLoadFactor(self.load_factor));
        }
        if W % P::CG_SIZE != 0 && P::CG_SIZE % W != 0 {
            return Err(ConfigError::ProbingSchemeMismatch {
                group_size: P::CG_SIZE,
                window_width: W,
            });
        }

        let sentinels = match self.erased_key {
            Some(erased) => Sentinels::with_erase(self.empty_key, erased)?,
            None => Sentinels::new(self.empty_key),
        };

        let lower_bound = ((self.capacity as f64) / self.load_factor).ceil() as usize;
        let num_windows = probing::make_window_extent(lower_bound, W);
        let storage = Storage::<W>::new(num_windows, sentinels.empty_key_bits());
        event::table_constructed(storage.capacity(), num_windows, W);

        Ok(Table {
            storage: RwLock::new(Arc::new(storage)),
            scheme: self.scheme,
            hasher: self.hasher,
            allocator: self.allocator,
            sentinels,
            mode: self.mode,
            size: AtomicU64::new(0),
            _marker: PhantomData,
        })
    }
}

/// A fixed-capacity, lock-free, open-addressing hash container (§2). `W` is
/// the window width (slots probed together per attempt); `P`, `H`, `A` are
/// the capability bundle — probing scheme, hash functor, device allocator —
/// consumed as generic parameters so the hot path never pays for `dyn`
/// dispatch (Design Notes).
pub struct Table<K, V, const W: usize, P = LinearProbing, H = AHashKeyHasher, A = SystemAllocator> {
    storage: RwLock<Arc<Storage<W>>>,
    scheme: P,
    hasher: H,
    allocator: A,
    sentinels: Sentinels<K>,
    mode: Mode,
    size: AtomicU64,
    _marker: PhantomData<V>,
}

impl<K: Key, V: Value, const W: usize> Table<K, V, W> {
    /// Starts a [`TableBuilder`] with the default probing scheme, hash
    /// functor, and allocator.
    pub fn builder(capacity: usize, empty_key: K) -> TableBuilder<K, V, W> {
        TableBuilder::new(capacity, empty_key)
    }
}

impl<K, V, const W: usize, P, H, A> Table<K, V, W, P, H, A>
where
    K: Key,
    V: Value,
    P: ProbingScheme,
    H: KeyHasher<K>,
    A: DeviceAllocator,
{
    pub fn capacity(&self) -> usize {
        self.storage.read().capacity()
    }

    /// Incrementally maintained live-entry count (§4.4/Open Question
    /// resolution in `DESIGN.md`): not a full storage scan.
    pub fn size(&self) -> u64 {
        self.size.load(Ordering::Relaxed)
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn empty_key_sentinel(&self) -> K {
        self.sentinels.empty_key()
    }

    pub fn erased_key_sentinel(&self) -> Option<K> {
        self.sentinels.erased_key()
    }

    pub fn probing_scheme(&self) -> &P {
        &self.scheme
    }

    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    /// Resets every slot to the empty sentinel and the size counter to
    /// zero (invariant: a freshly cleared table reports `size() == 0` and
    /// `contains` false for every key).
    pub fn clear(&self) {
        let storage = self.storage.read();
        storage.initialize(self.sentinels.empty_key_bits());
        self.size.store(0, Ordering::Relaxed);
    }
}

impl<K, V, const W: usize, P, H, A> Table<K, V, W, P, H, A>
where
    K: Key,
    V: Value,
    P: ProbingScheme + 'static,
    H: KeyHasher<K> + 'static,
    A: DeviceAllocator + 'static,
{
    /// §4.6 `insert_async`: inserts `keys[i]`/`values[i]` unless already
    /// present (in [`Mode::Unique`]). `out[i]` is `true` iff this call
    /// newly occupied a slot for `keys[i]`.
    pub fn insert_async(self: &Arc<Self>, stream: &Stream, keys: Vec<K>, values: Vec<V>) -> Handle<Vec<bool>> {
        self.insert_if_async(stream, keys, values, None)
    }

    /// Synchronous `insert`: blocks on the stream barrier before returning.
    pub fn insert(
        self: &Arc<Self>,
        stream: &Stream,
        keys: Vec<K>,
        values: Vec<V>,
    ) -> Result<Vec<bool>, crate::error::BackendError> {
        self.insert_async(stream, keys, values).wait()
    }

    /// §4.6 `insert_if_async`: like [`Self::insert_async`], but skips
    /// `keys[i]` whenever `stencil` is present and `stencil[i]` is `false`.
    pub fn insert_if_async(
        self: &Arc<Self>,
        stream: &Stream,
        keys: Vec<K>,
        values: Vec<V>,
        stencil: Option<Vec<bool>>,
    ) -> Handle<Vec<bool>> {
        let this = Arc::clone(self);
        stream.submit(move || {
            let mut out = vec![false; keys.len()];
            let storage = this.storage.read();
            dispatch::bulk_insert(
                &**storage,
                &this.scheme,
                &this.hasher,
                &this.sentinels,
                this.mode,
                &this.size,
                &keys,
                &values,
                stencil.as_deref(),
                &mut out,
            );
            out
        })
    }

    /// §4.6 `erase_async`. Requires the table to have been built with
    /// `with_erase`.
    pub fn erase_async(self: &Arc<Self>, stream: &Stream, keys: Vec<K>) -> Handle<Vec<bool>> {
        let this = Arc::clone(self);
        stream.submit(move || {
            let mut out = vec![false; keys.len()];
            let storage = this.storage.read();
            dispatch::bulk_erase(
                &**storage,
                &this.scheme,
                &this.hasher,
                &this.sentinels,
                &this.size,
                &keys,
                &mut out,
            );
            out
        })
    }

    pub fn erase(self: &Arc<Self>, stream: &Stream, keys: Vec<K>) -> Result<Vec<bool>, crate::error::BackendError> {
        self.erase_async(stream, keys).wait()
    }

    /// §4.6 `contains_async`.
    pub fn contains_async(self: &Arc<Self>, stream: &Stream, keys: Vec<K>) -> Handle<Vec<bool>> {
        self.contains_if_async(stream, keys, None)
    }

    pub fn contains(self: &Arc<Self>, stream: &Stream, keys: Vec<K>) -> Result<Vec<bool>, crate::error::BackendError> {
        self.contains_async(stream, keys).wait()
    }

    /// §4.6 `contains_if_async`: skips `keys[i]` (reporting `false`)
    /// wherever `stencil[i]` is `false`.
    pub fn contains_if_async(
        self: &Arc<Self>,
        stream: &Stream,
        keys: Vec<K>,
        stencil: Option<Vec<bool>>,
    ) -> Handle<Vec<bool>> {
        let this = Arc::clone(self);
        stream.submit(move || {
            let mut out = vec![false; keys.len()];
            let storage = this.storage.read();
            dispatch::bulk_contains(
                &**storage,
                &this.scheme,
                &this.hasher,
                &this.sentinels,
                &keys,
                stencil.as_deref(),
                &mut out,
            );
            out
        })
    }

    /// §4.6 `find_async`.
    pub fn find_async(self: &Arc<Self>, stream: &Stream, keys: Vec<K>) -> Handle<Vec<Option<V>>> {
        let this = Arc::clone(self);
        stream.submit(move || {
            let mut out: Vec<Option<V>> = vec![None; keys.len()];
            let storage = this.storage.read();
            dispatch::bulk_find(&**storage, &this.scheme, &this.hasher, &this.sentinels, &keys, &mut out);
            out
        })
    }

    pub fn find(self: &Arc<Self>, stream: &Stream, keys: Vec<K>) -> Result<Vec<Option<V>>, crate::error::BackendError> {
        self.find_async(stream, keys).wait()
    }

    /// §4.6 `insert_and_find_async`.
    pub fn insert_and_find_async(
        self: &Arc<Self>,
        stream: &Stream,
        keys: Vec<K>,
        values: Vec<V>,
    ) -> Handle<Vec<(bool, V)>> {
        let this = Arc::clone(self);
        stream.submit(move || {
            let mut out: Vec<(bool, V)> = values.iter().map(|&v| (false, v)).collect();
            let storage = this.storage.read();
            dispatch::bulk_insert_and_find(
                &**storage,
                &this.scheme,
                &this.hasher,
                &this.sentinels,
                &this.size,
                &keys,
                &values,
                &mut out,
            );
            out
        })
    }

    /// §4.6 `count_outer_async`.
    pub fn count_outer_async(self: &Arc<Self>, stream: &Stream, keys: Vec<K>) -> Handle<Vec<u64>> {
        let this = Arc::clone(self);
        stream.submit(move || {
            let mut out = vec![0u64; keys.len()];
            let storage = this.storage.read();
            dispatch::bulk_count_outer(
                &**storage,
                &this.scheme,
                &this.hasher,
                &this.sentinels,
                this.mode,
                &keys,
                &mut out,
            );
            out
        })
    }

    /// §4.6 `count_async`: the total match count across all of `keys`
    /// (absent keys contribute `0`, unlike `count_outer`).
    pub fn count_async(self: &Arc<Self>, stream: &Stream, keys: Vec<K>) -> Handle<u64> {
        let this = Arc::clone(self);
        stream.submit(move || {
            let mut out = vec![0u64; keys.len()];
            let storage = this.storage.read();
            dispatch::bulk_count(
                &**storage,
                &this.scheme,
                &this.hasher,
                &this.sentinels,
                this.mode,
                &keys,
                &mut out,
            );
            out.into_iter().sum()
        })
    }

    /// §4.8 `retrieve_all_async`.
    pub fn retrieve_all_async(self: &Arc<Self>, stream: &Stream) -> Handle<(Vec<K>, Vec<V>)> {
        let this = Arc::clone(self);
        stream.submit(move || {
            let storage = this.storage.read();
            retrieve::retrieve_all::<K, V, W, A>(&**storage, &this.sentinels, &this.allocator)
        })
    }

    pub fn retrieve_all(self: &Arc<Self>, stream: &Stream) -> Result<(Vec<K>, Vec<V>), crate::error::BackendError> {
        self.retrieve_all_async(stream).wait()
    }

    /// §4.7 `rehash_async`: relocates every live entry into a freshly
    /// allocated, larger [`Storage`], then atomically publishes it.
    pub fn rehash_async(self: &Arc<Self>, stream: &Stream, new_lower_bound_capacity: usize) -> Handle<()> {
        let this = Arc::clone(self);
        stream.submit(move || {
            let old = Arc::clone(&this.storage.read());
            let new_storage = rehash::rehash::<K, W, P, H, A>(
                &old,
                &this.scheme,
                &this.hasher,
                &this.sentinels,
                this.mode,
                new_lower_bound_capacity,
                &this.allocator,
            );
            *this.storage.write() = new_storage;
        })
    }

    pub fn rehash(self: &Arc<Self>, stream: &Stream, new_lower_bound_capacity: usize) -> Result<(), crate::error::BackendError> {
        self.rehash_async(stream, new_lower_bound_capacity).wait()
    }
}
