use crate::result::CacheResult;

use std::any::Any;
use std::hash::Hash;
use std::sync::Arc;

use indexmap::IndexMap;

/// An insertion-ordered map returned by batch lookups.
///
/// Iteration order follows the order in which keys were supplied by the
/// caller, so results can be zipped back against a parallel list.
pub type ResultMap<K, V> = IndexMap<K, V, ahash::RandomState>;

/// The capability contract every backing store adapter implements.
///
/// Absence is always reported as [`CacheResult::Absent`], never as an error.
/// Implementations must be safe to share between threads; the read-through
/// layer calls them concurrently without any external locking.
pub trait Cache<K, V>: Send + Sync {
  /// Reads the entry for `key`.
  fn get(&self, key: &K) -> CacheResult<V>;

  /// Stores `value` under `key`, returning the stored value.
  fn put(&self, key: K, value: V) -> V;

  /// Removes the entry for `key`. Returns `true` if an entry was removed.
  fn remove(&self, key: &K) -> bool;

  /// Removes every entry.
  fn remove_all(&self);

  /// A human-readable name, used in logs and errors.
  fn name(&self) -> &str;

  /// Returns the concrete object backing this cache, if it exposes one.
  fn unwrap_any(&self) -> Option<&dyn Any>;

  /// Reads several keys at once.
  ///
  /// Absent keys are omitted. The returned map preserves the order of `keys`;
  /// a key that appears more than once is reported at its first position.
  /// Adapters with a native multi-get should override this.
  fn get_all(&self, keys: &[K]) -> ResultMap<K, V>
  where
    K: Eq + Hash + Clone,
  {
    let mut found = ResultMap::with_capacity_and_hasher(keys.len(), Default::default());
    for key in keys {
      if found.contains_key(key) {
        continue;
      }
      if let CacheResult::Present(value) = self.get(key) {
        found.insert(key.clone(), value);
      }
    }
    found
  }
}

/// Typed access to the concrete object behind any [`Cache`], including
/// `dyn Cache<K, V>` trait objects.
pub trait CacheExt<K, V> {
  /// Returns the concrete backing object as a `T`, or `None` if it is not a `T`.
  fn unwrap<T: Any>(&self) -> Option<&T>;
}

impl<K, V, C> CacheExt<K, V> for C
where
  C: Cache<K, V> + ?Sized,
{
  fn unwrap<T: Any>(&self) -> Option<&T> {
    self.unwrap_any().and_then(|any| any.downcast_ref::<T>())
  }
}

/// Matches a full key against one of its components.
///
/// Used by [`PartialKeyCache`] scans.
pub trait PartialKey<P: ?Sized> {
  fn matches_partial(&self, partial: &P) -> bool;
}

impl<A: PartialEq, B> PartialKey<A> for (A, B) {
  fn matches_partial(&self, partial: &A) -> bool {
    self.0 == *partial
  }
}

/// Optional lookup by a component of the key.
///
/// Backing stores are not expected to index key components, so both lookups
/// are linear scans over every entry: O(n) in the size of the store.
pub trait PartialKeyCache<K, V, P: ?Sized>: Cache<K, V> {
  /// Returns the value of some entry whose key matches `partial`.
  ///
  /// Which entry wins when several match is unspecified.
  fn get_by_partial_key(&self, partial: &P) -> CacheResult<V>;

  /// Returns the values of every entry whose key matches `partial`, or `None`
  /// if nothing matched.
  fn get_all_by_partial_key(&self, partial: &P) -> Option<Vec<V>>;
}

// --- Forwarding impls so caches can be shared and swapped behind pointers ---

impl<K, V, C> Cache<K, V> for Arc<C>
where
  C: Cache<K, V> + ?Sized,
{
  fn get(&self, key: &K) -> CacheResult<V> {
    (**self).get(key)
  }

  fn put(&self, key: K, value: V) -> V {
    (**self).put(key, value)
  }

  fn remove(&self, key: &K) -> bool {
    (**self).remove(key)
  }

  fn remove_all(&self) {
    (**self).remove_all()
  }

  fn name(&self) -> &str {
    (**self).name()
  }

  fn unwrap_any(&self) -> Option<&dyn Any> {
    (**self).unwrap_any()
  }

  fn get_all(&self, keys: &[K]) -> ResultMap<K, V>
  where
    K: Eq + Hash + Clone,
  {
    (**self).get_all(keys)
  }
}

impl<K, V, C> Cache<K, V> for Box<C>
where
  C: Cache<K, V> + ?Sized,
{
  fn get(&self, key: &K) -> CacheResult<V> {
    (**self).get(key)
  }

  fn put(&self, key: K, value: V) -> V {
    (**self).put(key, value)
  }

  fn remove(&self, key: &K) -> bool {
    (**self).remove(key)
  }

  fn remove_all(&self) {
    (**self).remove_all()
  }

  fn name(&self) -> &str {
    (**self).name()
  }

  fn unwrap_any(&self) -> Option<&dyn Any> {
    (**self).unwrap_any()
  }

  fn get_all(&self, keys: &[K]) -> ResultMap<K, V>
  where
    K: Eq + Hash + Clone,
  {
    (**self).get_all(keys)
  }
}

impl<K, V, P, C> PartialKeyCache<K, V, P> for Arc<C>
where
  P: ?Sized,
  C: PartialKeyCache<K, V, P> + ?Sized,
{
  fn get_by_partial_key(&self, partial: &P) -> CacheResult<V> {
    (**self).get_by_partial_key(partial)
  }

  fn get_all_by_partial_key(&self, partial: &P) -> Option<Vec<V>> {
    (**self).get_all_by_partial_key(partial)
  }
}
