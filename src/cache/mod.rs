//! Single-flight memoization of asynchronous computations.
//!
//! A [`SingleFlightCache`] maps keys to [`Handle`]s. The first call for a key
//! registers a computation; every later call for the same key receives a
//! handle to that same computation, whether it is still running or already
//! done. The factory runs at most once per entry, and its outcome, success or
//! failure, is replayed to every awaiter.
//!
//! # Examples
//!
//! ```
//! use futures_functools::cache::SingleFlightCache;
//! use futures_lite::future::block_on;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! block_on(async {
//!     let cache: SingleFlightCache<u32, u32> = SingleFlightCache::with_capacity(16);
//!     let calls = Arc::new(AtomicUsize::new(0));
//!
//!     let lookup = |n: u32| {
//!         let calls = calls.clone();
//!         cache.get_or_compute(n, move || async move {
//!             calls.fetch_add(1, Ordering::SeqCst);
//!             Ok(n * 2)
//!         })
//!     };
//!
//!     let (a, b) = (lookup(21), lookup(21));
//!     assert_eq!(a.await, Ok(42));
//!     assert_eq!(b.await, Ok(42));
//!     assert_eq!(calls.load(Ordering::SeqCst), 1);
//! });
//! ```
//!
//! # Eviction
//!
//! The map is bounded by a least-recently-used policy. Eviction only removes
//! an entry's *discoverability*: handles that were already handed out keep
//! working. An entry which is evicted while its computation is still in
//! flight stays joinable, so a new call for the same key attaches to the
//! running computation instead of starting a duplicate. Once the computation
//! has finished, or once nobody holds it anymore, the next call starts fresh.
//!
//! [`SingleFlightCache::invalidate`] and [`SingleFlightCache::clear`] follow
//! the same rule. A finished entry is forgotten, which is the way to retry a
//! failed computation, while one still in flight stays joinable: a key is
//! never computed twice at the same time.

use core::convert::Infallible;
use core::fmt;
use core::future::Future;
use core::hash::Hash;
use core::mem;
use core::num::NonZeroUsize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use log::{debug, trace};
use lru::LruCache;

pub use error::{ArgPosition, KeyError};
pub use handle::Handle;
pub use key::{CacheKey, CacheKeyBuilder, KeyValue};
pub use memoize::Memoize;

use handle::Shared;

mod error;
mod handle;
mod key;
mod memoize;

const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(128) {
    Some(n) => n,
    None => panic!("default capacity must be non-zero"),
};

/// How many entries a cache keeps discoverable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capacity {
    /// Keep at most this many entries, evicting the least recently used.
    Bounded(NonZeroUsize),
    /// Never evict.
    Unbounded,
    /// Keep nothing: every call gets a fresh handle.
    Disabled,
}

impl Capacity {
    /// A bounded capacity, where `0` disables caching.
    pub fn new(capacity: usize) -> Self {
        NonZeroUsize::new(capacity).map_or(Capacity::Disabled, Capacity::Bounded)
    }
}

impl Default for Capacity {
    fn default() -> Self {
        Capacity::Bounded(DEFAULT_CAPACITY)
    }
}

/// Counters describing the use of a cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheInfo {
    /// Calls which found an existing computation.
    pub hits: u64,
    /// Calls which registered a new computation.
    pub misses: u64,
    /// The configured bound.
    pub capacity: Capacity,
    /// Entries currently held in the map.
    pub len: usize,
}

struct Entries<K, V, E> {
    /// Discoverable entries; `None` when caching is disabled.
    lru: Option<LruCache<K, Arc<Shared<V, E>>>>,
    /// Entries pushed out of the map while still in flight, kept joinable
    /// until they finish.
    evicted: HashMap<K, Weak<Shared<V, E>>>,
    /// References displaced while the lock was held. Dropping the last one
    /// drops a parked computation, so they are released after unlocking.
    released: Vec<Arc<Shared<V, E>>>,
    hits: u64,
    misses: u64,
}

impl<K: Hash + Eq, V, E> Entries<K, V, E> {
    fn new(capacity: Capacity) -> Self {
        let lru = match capacity {
            Capacity::Bounded(n) => Some(LruCache::new(n)),
            Capacity::Unbounded => Some(LruCache::unbounded()),
            Capacity::Disabled => None,
        };
        Self {
            lru,
            evicted: HashMap::new(),
            released: Vec::new(),
            hits: 0,
            misses: 0,
        }
    }

    /// Find the computation registered for `key`, refreshing its recency.
    fn lookup(&mut self, key: &K) -> Option<Arc<Shared<V, E>>> {
        let lru = self.lru.as_mut()?;
        if let Some(shared) = lru.get(key) {
            return Some(shared.clone());
        }

        let (key, weak) = self.evicted.remove_entry(key)?;
        let shared = weak.upgrade()?;
        if !shared.is_pending() {
            self.released.push(shared);
            return None;
        }
        debug!("joining an in-flight computation which was pushed out of the map");
        self.insert(key, shared.clone());
        Some(shared)
    }

    fn insert(&mut self, key: K, shared: Arc<Shared<V, E>>) {
        let Some(lru) = self.lru.as_mut() else {
            self.released.push(shared);
            return;
        };
        if let Some((evicted_key, evicted)) = lru.push(key, shared) {
            trace!("evicted the least recently used entry");
            self.prune();
            self.park(evicted_key, evicted);
        }
    }

    /// Take `shared` out of the map's ownership. A computation still in
    /// flight stays joinable under `key`.
    fn park(&mut self, key: K, shared: Arc<Shared<V, E>>) {
        if shared.is_pending() {
            trace!("parked an in-flight entry; it stays joinable until it completes");
            self.evicted.insert(key, Arc::downgrade(&shared));
        }
        self.released.push(shared);
    }

    /// Drop index entries which can no longer be joined.
    fn prune(&mut self) {
        let released = &mut self.released;
        self.evicted.retain(|_, weak| match weak.upgrade() {
            Some(shared) => {
                let joinable = shared.is_pending();
                released.push(shared);
                joinable
            }
            None => false,
        });
    }

    /// Remove `key` from the map. Returns whether it was there.
    fn remove(&mut self, key: &K) -> bool {
        let popped = self.lru.as_mut().and_then(|lru| lru.pop_entry(key));
        match popped {
            Some((key, shared)) => {
                self.evicted.remove(&key);
                self.park(key, shared);
                true
            }
            None => {
                if let Some(shared) = self.evicted.get(key).and_then(Weak::upgrade) {
                    if !shared.is_pending() {
                        self.evicted.remove(key);
                    }
                    self.released.push(shared);
                }
                false
            }
        }
    }

    /// Empty the map and reset the counters.
    fn clear(&mut self) {
        self.prune();
        while let Some((key, shared)) = self.lru.as_mut().and_then(LruCache::pop_lru) {
            self.park(key, shared);
        }
        self.hits = 0;
        self.misses = 0;
    }

    fn len(&self) -> usize {
        self.lru.as_ref().map_or(0, LruCache::len)
    }
}

/// A bounded map from keys to single-flight computations.
///
/// All operations take `&self`; the map and its counters sit behind one
/// mutex, so a lookup and the insertion which follows a miss are a single
/// atomic step. Two concurrent calls for the same key can never both start a
/// computation.
pub struct SingleFlightCache<K, V, E = Infallible> {
    entries: Mutex<Entries<K, V, E>>,
    capacity: Capacity,
}

impl<K: Hash + Eq, V, E> SingleFlightCache<K, V, E> {
    /// Create a cache holding up to 128 entries.
    pub fn new() -> Self {
        Self::with_config(Capacity::default())
    }

    /// Create a cache holding up to `capacity` entries.
    ///
    /// A capacity of `0` disables caching altogether: every call starts its
    /// own computation.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_config(Capacity::new(capacity))
    }

    /// Create a cache which never evicts.
    pub fn unbounded() -> Self {
        Self::with_config(Capacity::Unbounded)
    }

    /// Create a cache with the given bound.
    pub fn with_config(capacity: Capacity) -> Self {
        Self {
            entries: Mutex::new(Entries::new(capacity)),
            capacity,
        }
    }

    /// Return a handle to the computation for `key`, registering `factory`
    /// if there is none yet.
    ///
    /// `factory` is dropped without being called when the key is already
    /// known. Otherwise it is called on the first poll of any handle for this
    /// key, never here.
    pub fn get_or_compute<F, Fut>(&self, key: K, factory: F) -> Handle<V, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        V: Send + 'static,
        E: Send + 'static,
    {
        self.with_entries(|entries| {
            if let Some(shared) = entries.lookup(&key) {
                entries.hits += 1;
                trace!("cache hit");
                return Handle::from_shared(shared);
            }

            entries.misses += 1;
            trace!("cache miss, registering a new computation");
            let shared = Arc::new(Shared::new(factory));
            entries.insert(key, shared.clone());
            Handle::from_shared(shared)
        })
    }

    /// Return a handle to the computation for `key`, if one is registered.
    ///
    /// Counts as an access for the eviction policy, but not as a hit.
    pub fn get(&self, key: &K) -> Option<Handle<V, E>> {
        self.with_entries(|entries| entries.lookup(key).map(Handle::from_shared))
    }

    /// Remove the entry for `key` from the map. Returns whether it was there.
    ///
    /// A finished entry is forgotten, so the next call starts a fresh
    /// computation; this is how a failure gets retried. A computation still
    /// in flight keeps running and the next call for `key` joins it.
    /// Handles already handed out are unaffected.
    pub fn invalidate(&self, key: &K) -> bool {
        let removed = self.with_entries(|entries| entries.remove(key));
        if removed {
            debug!("invalidated a cache entry");
        }
        removed
    }

    /// Empty the map and reset the counters.
    ///
    /// Like [`invalidate`](Self::invalidate) for every key: computations
    /// still in flight stay joinable until they complete.
    pub fn clear(&self) {
        self.with_entries(|entries| {
            debug!("clearing {} cache entries", entries.len());
            entries.clear();
        })
    }

    /// Number of entries currently held in the map.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Returns `true` if the map holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The configured bound.
    pub fn capacity(&self) -> Capacity {
        self.capacity
    }

    /// Snapshot of the cache counters.
    pub fn info(&self) -> CacheInfo {
        let entries = self.entries.lock().unwrap();
        CacheInfo {
            hits: entries.hits,
            misses: entries.misses,
            capacity: self.capacity,
            len: entries.len(),
        }
    }

    /// Run `f` on the locked entries, releasing displaced references only
    /// once the lock is gone.
    fn with_entries<R>(&self, f: impl FnOnce(&mut Entries<K, V, E>) -> R) -> R {
        let mut entries = self.entries.lock().unwrap();
        let out = f(&mut entries);
        let released = mem::take(&mut entries.released);
        drop(entries);
        drop(released);
        out
    }
}

impl<K: Hash + Eq, V, E> Default for SingleFlightCache<K, V, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Hash + Eq, V, E> fmt::Debug for SingleFlightCache<K, V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.lock().unwrap();
        f.debug_struct("SingleFlightCache")
            .field("len", &entries.len())
            .field("capacity", &self.capacity)
            .field("hits", &entries.hits)
            .field("misses", &entries.misses)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use futures_lite::future::{block_on, poll_once, yield_now};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn compute(
        cache: &SingleFlightCache<&'static str, usize, String>,
        key: &'static str,
        calls: &Arc<AtomicUsize>,
    ) -> Handle<usize, String> {
        let calls = calls.clone();
        cache.get_or_compute(key, move || async move {
            yield_now().await;
            Ok(calls.fetch_add(1, Ordering::SeqCst) + 1)
        })
    }

    #[test]
    fn same_key_shares_one_computation() {
        block_on(async {
            let cache = SingleFlightCache::with_capacity(4);
            let calls = Arc::new(AtomicUsize::new(0));

            let a = compute(&cache, "a", &calls);
            let b = compute(&cache, "a", &calls);
            assert_eq!(a, b);
            assert_eq!(a.await, Ok(1));
            assert_eq!(b.await, Ok(1));

            // Attaching after completion replays the value.
            assert_eq!(compute(&cache, "a", &calls).await, Ok(1));
            assert_eq!(calls.load(Ordering::SeqCst), 1);

            let info = cache.info();
            assert_eq!((info.hits, info.misses, info.len), (2, 1, 1));
        })
    }

    #[test]
    fn distinct_keys_are_independent() {
        block_on(async {
            let cache = SingleFlightCache::with_capacity(4);
            let calls = Arc::new(AtomicUsize::new(0));
            let failing = cache.get_or_compute("bad", || async { Err("boom".to_string()) });
            let fine = compute(&cache, "good", &calls);

            assert_eq!(failing.await, Err("boom".to_string()));
            assert_eq!(fine.await, Ok(1));
        })
    }

    #[test]
    fn failures_are_replayed_until_invalidated() {
        block_on(async {
            let cache = SingleFlightCache::with_capacity(4);
            let calls = Arc::new(AtomicUsize::new(0));
            let fail = |calls: Arc<AtomicUsize>| {
                move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<usize, _>("unavailable".to_string())
                }
            };

            let first = cache.get_or_compute("k", fail(calls.clone()));
            assert_eq!(first.await, Err("unavailable".to_string()));
            let again = cache.get_or_compute("k", fail(calls.clone()));
            assert_eq!(again.await, Err("unavailable".to_string()));
            assert_eq!(calls.load(Ordering::SeqCst), 1);

            assert!(cache.invalidate(&"k"));
            assert!(!cache.invalidate(&"k"));
            let retried = compute(&cache, "k", &calls);
            assert_eq!(retried.await, Ok(2));
        })
    }

    #[test]
    fn lru_eviction_drops_completed_entries() {
        block_on(async {
            let cache = SingleFlightCache::with_capacity(2);
            let calls = Arc::new(AtomicUsize::new(0));

            assert_eq!(compute(&cache, "a", &calls).await, Ok(1));
            assert_eq!(compute(&cache, "b", &calls).await, Ok(2));
            // Touch "a" so "b" becomes the least recently used.
            assert!(cache.get(&"a").is_some());
            assert_eq!(compute(&cache, "c", &calls).await, Ok(3));

            assert_eq!(cache.len(), 2);
            assert!(cache.get(&"b").is_none());
            assert_eq!(compute(&cache, "a", &calls).await, Ok(1));
            assert_eq!(compute(&cache, "b", &calls).await, Ok(4));
        })
    }

    #[test]
    fn evicted_in_flight_entry_is_joined() {
        block_on(async {
            let cache = SingleFlightCache::with_capacity(1);
            let calls = Arc::new(AtomicUsize::new(0));

            let mut first = compute(&cache, "a", &calls);
            assert!(poll_once(&mut first).await.is_none());

            // Evict "a" while it is still running.
            assert_eq!(compute(&cache, "b", &calls).await, Ok(1));
            assert!(cache.get(&"b").is_some());

            let joined = compute(&cache, "a", &calls);
            assert!(joined.ptr_eq(&first));
            assert_eq!(joined.await, Ok(2));
            assert_eq!(first.await, Ok(2));
            assert_eq!(calls.load(Ordering::SeqCst), 2);
        })
    }

    #[test]
    fn evicted_entry_starts_fresh_once_complete() {
        block_on(async {
            let cache = SingleFlightCache::with_capacity(1);
            let calls = Arc::new(AtomicUsize::new(0));

            let mut first = compute(&cache, "a", &calls);
            assert!(poll_once(&mut first).await.is_none());
            let _b = compute(&cache, "b", &calls);
            assert_eq!(first.await, Ok(1));

            let second = compute(&cache, "a", &calls);
            assert_eq!(second.await, Ok(2));
        })
    }

    #[test]
    fn abandoned_evicted_entry_is_not_joined() {
        let cache = SingleFlightCache::with_capacity(1);
        let calls = Arc::new(AtomicUsize::new(0));

        let first = compute(&cache, "a", &calls);
        let _b = compute(&cache, "b", &calls);
        drop(first);

        let fresh = compute(&cache, "a", &calls);
        assert_eq!(format!("{fresh:?}"), "Handle { state: \"Idle\", refs: 2 }");
        assert_eq!(block_on(fresh), Ok(1));
    }

    #[test]
    fn invalidate_keeps_in_flight_entries_joinable() {
        block_on(async {
            let cache = SingleFlightCache::with_capacity(4);
            let calls = Arc::new(AtomicUsize::new(0));

            let first = compute(&cache, "a", &calls);
            assert!(cache.invalidate(&"a"));
            assert!(cache.is_empty());
            let second = compute(&cache, "a", &calls);
            assert!(second.ptr_eq(&first));

            assert_eq!(first.await, Ok(1));
            assert_eq!(second.await, Ok(1));
            assert_eq!(calls.load(Ordering::SeqCst), 1);

            // Once finished, invalidating forgets the entry.
            assert!(cache.invalidate(&"a"));
            assert_eq!(compute(&cache, "a", &calls).await, Ok(2));
        })
    }

    #[test]
    fn clear_resets_entries_and_counters() {
        block_on(async {
            let cache = SingleFlightCache::new();
            let calls = Arc::new(AtomicUsize::new(0));
            let _ = compute(&cache, "a", &calls).await;
            let _ = compute(&cache, "a", &calls).await;

            cache.clear();
            assert!(cache.is_empty());
            assert_eq!(
                cache.info(),
                CacheInfo {
                    hits: 0,
                    misses: 0,
                    capacity: Capacity::default(),
                    len: 0,
                }
            );
            assert_eq!(compute(&cache, "a", &calls).await, Ok(2));
        })
    }

    #[test]
    fn clear_while_in_flight_is_joined() {
        block_on(async {
            let cache = SingleFlightCache::with_capacity(4);
            let calls = Arc::new(AtomicUsize::new(0));

            let mut first = compute(&cache, "a", &calls);
            assert!(poll_once(&mut first).await.is_none());
            cache.clear();
            assert!(cache.is_empty());

            let second = compute(&cache, "a", &calls);
            assert!(second.ptr_eq(&first));
            assert_eq!(cache.info().hits, 1);
            assert_eq!(second.await, Ok(1));
            assert_eq!(first.await, Ok(1));
            assert_eq!(calls.load(Ordering::SeqCst), 1);
        })
    }

    #[test]
    fn clear_drops_abandoned_computations() {
        let cache = SingleFlightCache::with_capacity(4);
        let calls = Arc::new(AtomicUsize::new(0));

        let first = compute(&cache, "a", &calls);
        cache.clear();
        drop(first);

        let fresh = compute(&cache, "a", &calls);
        assert_eq!(format!("{fresh:?}"), "Handle { state: \"Idle\", refs: 2 }");
        assert_eq!(cache.info().misses, 1);
        assert_eq!(block_on(fresh), Ok(1));
    }

    #[test]
    fn disabled_cache_never_shares() {
        block_on(async {
            let cache = SingleFlightCache::with_capacity(0);
            let calls = Arc::new(AtomicUsize::new(0));

            let a = compute(&cache, "a", &calls);
            let b = compute(&cache, "a", &calls);
            assert_ne!(a, b);
            assert_eq!(a.await, Ok(1));
            assert_eq!(b.await, Ok(2));
            assert_eq!(cache.capacity(), Capacity::Disabled);
            assert_eq!(cache.info().misses, 2);
        })
    }

    #[test]
    fn unbounded_cache_keeps_everything() {
        let cache: SingleFlightCache<usize, usize> = SingleFlightCache::unbounded();
        for n in 0..1_000 {
            let _ = cache.get_or_compute(n, move || async move { Ok(n) });
        }
        assert_eq!(cache.len(), 1_000);
    }
}
