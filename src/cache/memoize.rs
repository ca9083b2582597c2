use core::fmt;
use core::future::Future;
use core::hash::Hash;
use core::marker::PhantomData;
use std::sync::Arc;

use super::{Capacity, Handle, KeyError, SingleFlightCache};

/// An async function wrapped in a [`SingleFlightCache`].
///
/// `key_fn` derives the cache key from the call arguments; `func` produces
/// the computation. Calls whose arguments map to the same key share one
/// computation.
///
/// # Examples
///
/// ```
/// use futures_functools::cache::{CacheKey, Capacity, Memoize};
/// use futures_lite::future::block_on;
///
/// let square = Memoize::new(
///     Capacity::new(32),
///     |n: &u64| CacheKey::builder().arg(*n).build(),
///     |n: u64| async move { Ok::<_, String>(n * n) },
/// );
///
/// block_on(async {
///     assert_eq!(square.call(12)?.await, Ok(144));
///     assert_eq!(square.cache().info().misses, 1);
///     assert_eq!(square.call(12)?.await, Ok(144));
///     assert_eq!(square.cache().info().hits, 1);
///     Ok::<(), futures_functools::cache::KeyError>(())
/// })?;
/// # Ok::<(), futures_functools::cache::KeyError>(())
/// ```
pub struct Memoize<A, K, V, E, KF, F> {
    cache: SingleFlightCache<K, V, E>,
    key_fn: KF,
    func: Arc<F>,
    _args: PhantomData<fn(A)>,
}

impl<A, K, V, E, KF, F, Fut> Memoize<A, K, V, E, KF, F>
where
    K: Hash + Eq,
    KF: Fn(&A) -> Result<K, KeyError>,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<V, E>> + Send + 'static,
    A: Send + 'static,
    V: Send + 'static,
    E: Send + 'static,
{
    /// Wrap `func`, keying calls with `key_fn`.
    pub fn new(capacity: Capacity, key_fn: KF, func: F) -> Self {
        Self {
            cache: SingleFlightCache::with_config(capacity),
            key_fn,
            func: Arc::new(func),
            _args: PhantomData,
        }
    }

    /// Call the wrapped function, sharing the computation with every other
    /// call for the same key.
    ///
    /// Fails without touching the cache if no key can be derived from `args`.
    pub fn call(&self, args: A) -> Result<Handle<V, E>, KeyError> {
        let key = (self.key_fn)(&args)?;
        let func = Arc::clone(&self.func);
        Ok(self.cache.get_or_compute(key, move || func(args)))
    }

    /// The underlying cache.
    pub fn cache(&self) -> &SingleFlightCache<K, V, E> {
        &self.cache
    }
}

impl<A, K, V, E, KF, F> fmt::Debug for Memoize<A, K, V, E, KF, F>
where
    K: Hash + Eq,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memoize")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
