use crate::cache::Cache;
use crate::error::BuildError;
use crate::memory::MemoryCache;
use crate::read_through::{ReadThroughCache, Sanitizer};
use crate::single_flight::SingleFlightLoader;

use core::fmt;
use std::hash::{BuildHasher, Hash};
use std::marker::PhantomData;
use std::sync::Arc;

const DEFAULT_NAME: &str = "default";

/// The shard count used when none is configured: four per CPU, rounded up to
/// a power of two.
pub(crate) fn default_shards() -> usize {
  (num_cpus::get() * 4).max(1).next_power_of_two()
}

/// A builder for read-through caches and their in-memory backing store.
pub struct CacheBuilder<K, V, H = ahash::RandomState> {
  name: Option<String>,
  shards: usize,
  hasher: H,
  lock_table_capacity: usize,
  sanitizer: Option<Sanitizer<V>>,
  _key_marker: PhantomData<K>,
}

// Manual Debug implementation for CacheBuilder.
impl<K, V, H> fmt::Debug for CacheBuilder<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheBuilder")
      .field("name", &self.name)
      .field("shards", &self.shards)
      .field("lock_table_capacity", &self.lock_table_capacity)
      .field("has_sanitizer", &self.sanitizer.is_some())
      .finish_non_exhaustive()
  }
}

// --- General Configuration Methods ---
impl<K, V, H> CacheBuilder<K, V, H> {
  /// Sets the name reported by `Cache::name` and used in log events.
  pub fn name(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }

  /// Sets the number of shards of the in-memory backing store.
  ///
  /// Has no effect on `build_with`, where the caller supplies the store.
  pub fn shards(mut self, shards: usize) -> Self {
    self.shards = if shards == 0 {
      0
    } else {
      shards.next_power_of_two()
    };
    self
  }

  /// Pre-sizes the single-flight lock table for roughly this many keys
  /// loading at the same time.
  pub fn lock_table_capacity(mut self, capacity: usize) -> Self {
    self.lock_table_capacity = capacity;
    self
  }

  /// Sets a hook applied to every value before it is written to the backing
  /// store.
  pub fn sanitizer(mut self, f: impl Fn(V) -> V + Send + Sync + 'static) -> Self {
    self.sanitizer = Some(Arc::new(f));
    self
  }

  /// Sets the hasher used by the backing store and the lock table.
  pub fn hasher<H2>(self, hasher: H2) -> CacheBuilder<K, V, H2> {
    CacheBuilder {
      name: self.name,
      shards: self.shards,
      hasher,
      lock_table_capacity: self.lock_table_capacity,
      sanitizer: self.sanitizer,
      _key_marker: PhantomData,
    }
  }
}

// --- Default Constructor ---
impl<K, V, H: BuildHasher + Default> CacheBuilder<K, V, H> {
  /// Creates a new `CacheBuilder` with default settings.
  pub fn new() -> Self {
    Self {
      name: None,
      shards: default_shards(),
      hasher: H::default(),
      lock_table_capacity: 0,
      sanitizer: None,
      _key_marker: PhantomData,
    }
  }
}

impl<K, V> Default for CacheBuilder<K, V, ahash::RandomState> {
  fn default() -> Self {
    Self::new()
  }
}

// --- Build Methods ---
impl<K, V, H> CacheBuilder<K, V, H>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Clone + Send + Sync + 'static,
  H: BuildHasher + Clone + Send + Sync + 'static,
{
  /// Builds a read-through cache over a new in-memory store.
  pub fn build(self) -> Result<ReadThroughCache<K, V, MemoryCache<K, V, H>, H>, BuildError> {
    let backing = self.build_memory_store()?;
    self.build_with(backing)
  }

  /// Builds a bare in-memory store, without the read-through layer.
  pub fn build_memory(self) -> Result<MemoryCache<K, V, H>, BuildError> {
    self.build_memory_store()
  }

  /// Builds a read-through cache over a caller-supplied backing store.
  ///
  /// Unless a name was configured, the cache takes the backing store's name.
  pub fn build_with<C>(self, backing: C) -> Result<ReadThroughCache<K, V, C, H>, BuildError>
  where
    C: Cache<K, V>,
  {
    let name = match self.name {
      Some(name) => name,
      None => backing.name().to_string(),
    };
    if name.is_empty() {
      return Err(BuildError::EmptyName);
    }

    tracing::debug!(cache = %name, "building read-through cache");
    let loader = SingleFlightLoader::with_capacity_and_hasher(self.lock_table_capacity, self.hasher);
    Ok(ReadThroughCache::from_parts(
      name,
      backing,
      loader,
      self.sanitizer,
    ))
  }

  fn build_memory_store(&self) -> Result<MemoryCache<K, V, H>, BuildError> {
    self.validate()?;
    let name = self.name.clone().unwrap_or_else(|| DEFAULT_NAME.to_string());
    Ok(MemoryCache::with_shards(name, self.shards, self.hasher.clone()))
  }

  /// Validates the builder configuration.
  pub(crate) fn validate(&self) -> Result<(), BuildError> {
    if self.shards == 0 {
      return Err(BuildError::ZeroShards);
    }
    if matches!(&self.name, Some(name) if name.is_empty()) {
      return Err(BuildError::EmptyName);
    }
    Ok(())
  }
}
