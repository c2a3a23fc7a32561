use crate::cache::{Cache, PartialKeyCache, ResultMap};
use crate::error::{LoadError, LoadResult};
use crate::merge::{merge_results, uncached_keys};
use crate::metrics::MetricsSnapshot;
use crate::result::CacheResult;
use crate::single_flight::SingleFlightLoader;

use std::any::Any;
use std::collections::HashSet;
use std::convert::Infallible;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// A hook applied to every value before it is written to the backing store,
/// e.g. to detach a value from a live, non-thread-safe session.
pub type Sanitizer<V> = Arc<dyn Fn(V) -> V + Send + Sync>;

/// A read-through layer over any backing [`Cache`].
///
/// Single-key misses are routed through a [`SingleFlightLoader`], so a burst
/// of callers missing the same key runs the fallback once. Batch lookups read
/// what is cached, hand only the gaps to a batch fallback, write the loaded
/// entries back and return everything in the caller's key order.
///
/// `ReadThroughCache` is itself a [`Cache`], so it can be passed anywhere the
/// contract is expected.
pub struct ReadThroughCache<K, V, C, H = ahash::RandomState> {
  name: String,
  backing: C,
  loader: SingleFlightLoader<K, H>,
  sanitizer: Option<Sanitizer<V>>,
}

impl<K, V, C, H> fmt::Debug for ReadThroughCache<K, V, C, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ReadThroughCache")
      .field("name", &self.name)
      .field("loader", &self.loader)
      .field("has_sanitizer", &self.sanitizer.is_some())
      .finish_non_exhaustive()
  }
}

impl<K, V, C> ReadThroughCache<K, V, C, ahash::RandomState>
where
  C: Cache<K, V>,
{
  /// Wraps `backing` with default settings, reusing its name.
  pub fn new(backing: C) -> Self {
    let name = backing.name().to_string();
    Self::from_parts(name, backing, SingleFlightLoader::new(), None)
  }
}

impl<K, V, C, H> ReadThroughCache<K, V, C, H> {
  pub(crate) fn from_parts(
    name: String,
    backing: C,
    loader: SingleFlightLoader<K, H>,
    sanitizer: Option<Sanitizer<V>>,
  ) -> Self {
    Self {
      name,
      backing,
      loader,
      sanitizer,
    }
  }

  /// The backing store this layer reads from and writes to.
  pub fn backing(&self) -> &C {
    &self.backing
  }

  /// The loader coordinating single-key misses.
  pub fn loader(&self) -> &SingleFlightLoader<K, H> {
    &self.loader
  }

  pub fn metrics(&self) -> MetricsSnapshot {
    self.loader.metrics()
  }

  #[inline]
  fn sanitize(&self, value: V) -> V {
    match &self.sanitizer {
      Some(sanitize) => sanitize(value),
      None => value,
    }
  }
}

impl<K, V, C, H> ReadThroughCache<K, V, C, H>
where
  K: Eq + Hash + Clone,
  V: Clone,
  C: Cache<K, V>,
  H: BuildHasher,
{
  /// Returns the cached value for `key`, or computes it with `fallback`,
  /// caches it and returns it.
  ///
  /// Concurrent callers missing the same key share one `fallback` run.
  pub fn get_with<F>(&self, key: &K, fallback: F) -> V
  where
    F: FnOnce(&K) -> V,
  {
    self.loader.get(
      key,
      |key| self.sanitize(fallback(key)),
      |key| self.backing.get(key),
      |key, value| {
        self.backing.put(key.clone(), value.clone());
      },
    )
  }

  /// Like [`get_with`](Self::get_with), for fallbacks that can fail.
  ///
  /// The fallback's error is returned unchanged and nothing is cached.
  pub fn try_get_with<E, F>(&self, key: &K, fallback: F) -> Result<V, E>
  where
    F: FnOnce(&K) -> Result<V, E>,
  {
    self.loader.try_get(
      key,
      |key| fallback(key).map(|value| self.sanitize(value)),
      |key| self.backing.get(key),
      |key, value| {
        self.backing.put(key.clone(), value.clone());
      },
    )
  }

  /// Returns the values for `keys`, loading the uncached ones in one call to
  /// `fallback`.
  ///
  /// See [`try_get_all_with`](Self::try_get_all_with) for the exact rules.
  pub fn get_all_with<F, M>(&self, keys: &[K], fallback: F) -> LoadResult<ResultMap<K, V>>
  where
    F: FnOnce(&[K]) -> M,
    M: IntoIterator<Item = (K, V)>,
  {
    self.try_get_all_with(keys, |uncached| Ok::<M, Infallible>(fallback(uncached)))
  }

  /// Returns the values for `keys`, loading the uncached ones in one call to
  /// `fallback`.
  ///
  /// - If every key is cached, `fallback` is not called.
  /// - Otherwise `fallback` receives only the uncached keys, in input order.
  ///   Every entry it returns is written to the backing store.
  /// - If nothing was cached, the fallback's entries are returned in the
  ///   order the fallback produced them.
  /// - Otherwise cached and loaded entries are merged in the order of `keys`,
  ///   with keys found in neither left out.
  ///
  /// A fallback error aborts the lookup as [`LoadError::Fallback`]. If the
  /// backing store reports cached entries that do not belong to `keys`, the
  /// lookup fails with [`LoadError::InconsistentKeys`] instead of returning
  /// misordered data.
  pub fn try_get_all_with<E, F, M>(&self, keys: &[K], fallback: F) -> LoadResult<ResultMap<K, V>, E>
  where
    F: FnOnce(&[K]) -> Result<M, E>,
    M: IntoIterator<Item = (K, V)>,
  {
    let cached = self.backing.get_all(keys);
    if cached.len() == keys.len() {
      return Ok(cached);
    }

    let uncached = uncached_keys(keys, &cached);
    let requested = keys.iter().collect::<HashSet<_, ahash::RandomState>>().len();
    if requested - uncached.len() != cached.len() {
      tracing::warn!(
        cache = %self.name,
        cached = cached.len(),
        requested,
        uncached = uncached.len(),
        "cached subset does not match the requested keys"
      );
      return Err(LoadError::InconsistentKeys {
        cache: self.name.clone(),
        cached: cached.len(),
        requested,
      });
    }

    if uncached.is_empty() {
      return Ok(cached);
    }

    tracing::debug!(
      cache = %self.name,
      cached = cached.len(),
      uncached = uncached.len(),
      "loading uncached keys"
    );
    let metrics = self.loader.raw_metrics();
    metrics.batch_loads.fetch_add(1, Ordering::Relaxed);

    let mut loaded = ResultMap::with_capacity_and_hasher(uncached.len(), Default::default());
    for (key, value) in fallback(&uncached).map_err(LoadError::Fallback)? {
      let value = self.backing.put(key.clone(), self.sanitize(value));
      loaded.insert(key, value);
    }
    metrics
      .batch_keys_loaded
      .fetch_add(loaded.len() as u64, Ordering::Relaxed);

    if cached.is_empty() {
      return Ok(loaded);
    }
    Ok(merge_results(keys, cached, loaded))
  }
}

impl<K, V, C, H> Cache<K, V> for ReadThroughCache<K, V, C, H>
where
  K: Send + Sync,
  V: Send + Sync,
  C: Cache<K, V>,
  H: Send + Sync,
{
  fn get(&self, key: &K) -> CacheResult<V> {
    self.backing.get(key)
  }

  fn put(&self, key: K, value: V) -> V {
    self.backing.put(key, self.sanitize(value))
  }

  fn remove(&self, key: &K) -> bool {
    self.backing.remove(key)
  }

  fn remove_all(&self) {
    self.backing.remove_all()
  }

  fn name(&self) -> &str {
    &self.name
  }

  fn unwrap_any(&self) -> Option<&dyn Any> {
    self.backing.unwrap_any()
  }

  fn get_all(&self, keys: &[K]) -> ResultMap<K, V>
  where
    K: Eq + Hash + Clone,
  {
    self.backing.get_all(keys)
  }
}

impl<K, V, P, C, H> PartialKeyCache<K, V, P> for ReadThroughCache<K, V, C, H>
where
  K: Send + Sync,
  V: Send + Sync,
  P: ?Sized,
  C: PartialKeyCache<K, V, P>,
  H: Send + Sync,
{
  fn get_by_partial_key(&self, partial: &P) -> CacheResult<V> {
    self.backing.get_by_partial_key(partial)
  }

  fn get_all_by_partial_key(&self, partial: &P) -> Option<Vec<V>> {
    self.backing.get_all_by_partial_key(partial)
  }
}
