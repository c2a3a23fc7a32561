use crate::cache::{Cache, PartialKey, PartialKeyCache, ResultMap};
use crate::result::CacheResult;

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::hash::{BuildHasher, Hash};

use crossbeam_utils::CachePadded;
use parking_lot::RwLock;

type Shard<K, V, H> = CachePadded<RwLock<HashMap<K, V, H>>>;

/// An unbounded, in-process backing store.
///
/// Entries are partitioned into independently locked shards so that readers
/// and writers on different keys rarely touch the same lock. There is no
/// eviction and no expiry; entries live until they are removed.
pub struct MemoryCache<K, V, H = ahash::RandomState> {
  name: String,
  shards: Box<[Shard<K, V, H>]>,
  hasher: H,
}

impl<K, V, H> fmt::Debug for MemoryCache<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MemoryCache")
      .field("name", &self.name)
      .field("num_shards", &self.shards.len())
      .finish()
  }
}

impl<K, V, H> MemoryCache<K, V, H>
where
  K: Eq + Hash,
  H: BuildHasher + Clone,
{
  /// Creates a store with `num_shards` shards. Callers are expected to pass a
  /// non-zero count; the builder validates this.
  pub(crate) fn with_shards(name: String, num_shards: usize, hasher: H) -> Self {
    let shards = (0..num_shards.max(1))
      .map(|_| CachePadded::new(RwLock::new(HashMap::with_hasher(hasher.clone()))))
      .collect::<Vec<_>>();

    Self {
      name,
      shards: shards.into_boxed_slice(),
      hasher,
    }
  }

  #[inline]
  fn shard_index(&self, key: &K) -> usize {
    self.hasher.hash_one(key) as usize % self.shards.len()
  }

  #[inline]
  fn shard(&self, key: &K) -> &RwLock<HashMap<K, V, H>> {
    &self.shards[self.shard_index(key)]
  }

  /// The number of entries across all shards.
  pub fn len(&self) -> usize {
    self.shards.iter().map(|shard| shard.read().len()).sum()
  }

  pub fn is_empty(&self) -> bool {
    self.shards.iter().all(|shard| shard.read().is_empty())
  }
}

impl<K, V> MemoryCache<K, V, ahash::RandomState>
where
  K: Eq + Hash,
{
  /// Creates a store with the default shard count.
  pub fn new(name: impl Into<String>) -> Self {
    Self::with_shards(
      name.into(),
      crate::builder::default_shards(),
      ahash::RandomState::new(),
    )
  }
}

impl<K, V, H> Cache<K, V> for MemoryCache<K, V, H>
where
  K: Eq + Hash + Send + Sync + 'static,
  V: Clone + Send + Sync + 'static,
  H: BuildHasher + Clone + Send + Sync + 'static,
{
  fn get(&self, key: &K) -> CacheResult<V> {
    self.shard(key).read().get(key).cloned().into()
  }

  fn put(&self, key: K, value: V) -> V {
    let shard = self.shard(&key);
    shard.write().insert(key, value.clone());
    value
  }

  fn remove(&self, key: &K) -> bool {
    self.shard(key).write().remove(key).is_some()
  }

  fn remove_all(&self) {
    for shard in self.shards.iter() {
      shard.write().clear();
    }
  }

  fn name(&self) -> &str {
    &self.name
  }

  fn unwrap_any(&self) -> Option<&dyn Any> {
    Some(self)
  }

  /// Groups the keys by shard so each shard's read lock is taken once, then
  /// lays the hits back out in the caller's key order.
  fn get_all(&self, keys: &[K]) -> ResultMap<K, V>
  where
    K: Eq + Hash + Clone,
  {
    let mut keys_by_shard: Vec<Vec<&K>> = vec![Vec::new(); self.shards.len()];
    for key in keys {
      keys_by_shard[self.shard_index(key)].push(key);
    }

    let mut hits: HashMap<&K, V, ahash::RandomState> = HashMap::default();
    for (i, shard_keys) in keys_by_shard.iter().enumerate() {
      if shard_keys.is_empty() {
        continue;
      }
      let guard = self.shards[i].read();
      for key in shard_keys {
        if let Some(value) = guard.get(*key) {
          hits.insert(*key, value.clone());
        }
      }
    }

    let mut found = ResultMap::with_capacity_and_hasher(hits.len(), Default::default());
    for key in keys {
      if let Some(value) = hits.remove(key) {
        found.insert(key.clone(), value);
      }
    }
    found
  }
}

impl<K, V, H, P> PartialKeyCache<K, V, P> for MemoryCache<K, V, H>
where
  K: PartialKey<P> + Eq + Hash + Send + Sync + 'static,
  V: Clone + Send + Sync + 'static,
  H: BuildHasher + Clone + Send + Sync + 'static,
  P: ?Sized,
{
  fn get_by_partial_key(&self, partial: &P) -> CacheResult<V> {
    for shard in self.shards.iter() {
      let guard = shard.read();
      if let Some(value) = guard
        .iter()
        .find(|(key, _)| key.matches_partial(partial))
        .map(|(_, value)| value.clone())
      {
        return CacheResult::Present(value);
      }
    }
    CacheResult::Absent
  }

  fn get_all_by_partial_key(&self, partial: &P) -> Option<Vec<V>> {
    let mut matches = Vec::new();
    for shard in self.shards.iter() {
      let guard = shard.read();
      matches.extend(
        guard
          .iter()
          .filter(|(key, _)| key.matches_partial(partial))
          .map(|(_, value)| value.clone()),
      );
    }
    if matches.is_empty() {
      None
    } else {
      Some(matches)
    }
  }
}
