use crate::cache::{Cache, PartialKeyCache, ResultMap};
use crate::result::CacheResult;

use std::any::Any;
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

/// A cache that never stores anything.
///
/// Every read misses, `put` hands its value straight back so fluent call
/// chains keep working, and `remove` never finds anything. Swap it in behind
/// an `Arc<dyn Cache<K, V>>` to turn caching off without touching call sites.
pub struct NullCache<K, V> {
  name: String,
  _marker: PhantomData<fn(K) -> V>,
}

impl<K, V> NullCache<K, V> {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      _marker: PhantomData,
    }
  }
}

impl<K, V> Default for NullCache<K, V> {
  fn default() -> Self {
    Self::new("null")
  }
}

impl<K, V> fmt::Debug for NullCache<K, V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("NullCache").field("name", &self.name).finish()
  }
}

impl<K, V> Cache<K, V> for NullCache<K, V> {
  fn get(&self, _key: &K) -> CacheResult<V> {
    CacheResult::Absent
  }

  fn put(&self, _key: K, value: V) -> V {
    value
  }

  fn remove(&self, _key: &K) -> bool {
    false
  }

  fn remove_all(&self) {}

  fn name(&self) -> &str {
    &self.name
  }

  fn unwrap_any(&self) -> Option<&dyn Any> {
    None
  }

  fn get_all(&self, _keys: &[K]) -> ResultMap<K, V>
  where
    K: Eq + Hash + Clone,
  {
    ResultMap::default()
  }
}

impl<K, V, P: ?Sized> PartialKeyCache<K, V, P> for NullCache<K, V> {
  fn get_by_partial_key(&self, _partial: &P) -> CacheResult<V> {
    CacheResult::Absent
  }

  fn get_all_by_partial_key(&self, _partial: &P) -> Option<Vec<V>> {
    None
  }
}
