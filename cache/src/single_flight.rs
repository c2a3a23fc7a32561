use crate::metrics::{Metrics, MetricsSnapshot};
use crate::result::CacheResult;

use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::Mutex;

/// A lock-table slot: the per-key lock plus the number of callers currently
/// holding a lease on it. `leases` is only read or written under the
/// table-wide mutex.
struct KeyLock {
  gate: Arc<Mutex<()>>,
  leases: usize,
}

type LockTable<K, H> = Mutex<HashMap<K, KeyLock, H>>;

/// Coalesces concurrent cache misses so that, per key, at most one fallback
/// evaluation runs at any instant.
///
/// The first check against the cache takes no lock at all. Only on a miss does
/// a caller lease the lock for that key from a shared table and block on it.
/// Once it holds the lock it checks the cache again: if another caller
/// populated the entry in the meantime, that value is returned and the
/// fallback is skipped. Different keys use different locks and never wait on
/// each other; the table-wide mutex is held only while the table itself is
/// mutated, never while a fallback runs.
///
/// Table entries are keyed by the cache key and reference counted by lease, so
/// an entry disappears as soon as the last caller interested in that key is
/// done with it. The lease is released by a drop guard, which means errors
/// and panics from the fallback leave neither a held lock nor a stale entry.
pub struct SingleFlightLoader<K, H = ahash::RandomState> {
  locks: LockTable<K, H>,
  metrics: Metrics,
}

impl<K, H> fmt::Debug for SingleFlightLoader<K, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SingleFlightLoader")
      .field("lock_table_len", &self.locks.lock().len())
      .field("metrics", &self.metrics.snapshot())
      .finish()
  }
}

impl<K> SingleFlightLoader<K, ahash::RandomState> {
  pub fn new() -> Self {
    Self::with_hasher(ahash::RandomState::new())
  }
}

impl<K> Default for SingleFlightLoader<K, ahash::RandomState> {
  fn default() -> Self {
    Self::new()
  }
}

impl<K, H> SingleFlightLoader<K, H> {
  pub fn with_hasher(hasher: H) -> Self {
    Self::with_capacity_and_hasher(0, hasher)
  }

  /// Pre-sizes the lock table for roughly `capacity` keys loading at once.
  pub fn with_capacity_and_hasher(capacity: usize, hasher: H) -> Self {
    Self {
      locks: Mutex::new(HashMap::with_capacity_and_hasher(capacity, hasher)),
      metrics: Metrics::new(),
    }
  }

  /// The number of keys that currently have a lock-table entry, i.e. keys
  /// with at least one caller waiting on or running their fallback.
  pub fn lock_table_len(&self) -> usize {
    self.locks.lock().len()
  }

  pub fn metrics(&self) -> MetricsSnapshot {
    self.metrics.snapshot()
  }

  pub(crate) fn raw_metrics(&self) -> &Metrics {
    &self.metrics
  }
}

impl<K, H> SingleFlightLoader<K, H>
where
  K: Eq + Hash + Clone,
  H: BuildHasher,
{
  /// Returns the cached value for `key`, computing and caching it on a miss.
  ///
  /// - `check_cache` reads the cache. It runs once without any lock and,
  ///   on a miss, once more while the per-key lock is held.
  /// - `fallback` computes the value. It runs only while the per-key lock is
  ///   held, so concurrent callers for the same key never run it twice.
  /// - `populate_cache` writes the computed value back before the lock is
  ///   released, which is what lets waiting callers find it on their re-check.
  ///
  /// The per-key lock is not reentrant: `fallback` must not load the same key
  /// through the same loader, or it deadlocks on itself.
  pub fn get<V, F, C, P>(&self, key: &K, fallback: F, check_cache: C, populate_cache: P) -> V
  where
    F: FnOnce(&K) -> V,
    C: Fn(&K) -> CacheResult<V>,
    P: FnOnce(&K, &V),
  {
    let loaded = self.try_get(
      key,
      |key| Ok::<V, Infallible>(fallback(key)),
      check_cache,
      populate_cache,
    );
    match loaded {
      Ok(value) => value,
      Err(never) => match never {},
    }
  }

  /// Like [`get`](Self::get), but for fallbacks that can fail.
  ///
  /// A fallback error is returned to this caller unchanged and nothing is
  /// written to the cache. There is no retry: the next caller for the key
  /// acquires the lock and runs its own fallback.
  pub fn try_get<V, E, F, C, P>(
    &self,
    key: &K,
    fallback: F,
    check_cache: C,
    populate_cache: P,
  ) -> Result<V, E>
  where
    F: FnOnce(&K) -> Result<V, E>,
    C: Fn(&K) -> CacheResult<V>,
    P: FnOnce(&K, &V),
  {
    if let CacheResult::Present(value) = check_cache(key) {
      self.metrics.hits.fetch_add(1, Ordering::Relaxed);
      return Ok(value);
    }
    self.metrics.misses.fetch_add(1, Ordering::Relaxed);

    // Declaration order matters: `_held` drops before `lease`, so the key lock
    // is released before the table entry is cleaned up.
    let lease = self.lease(key);
    let _held = lease.gate.lock();

    if let CacheResult::Present(value) = check_cache(key) {
      self.metrics.coalesced.fetch_add(1, Ordering::Relaxed);
      return Ok(value);
    }

    self.metrics.loads.fetch_add(1, Ordering::Relaxed);
    tracing::trace!("running fallback under per-key lock");
    match fallback(key) {
      Ok(value) => {
        populate_cache(key, &value);
        Ok(value)
      }
      Err(err) => {
        self.metrics.load_failures.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("fallback failed; releasing per-key lock");
        Err(err)
      }
    }
  }

  /// Finds or creates the lock for `key` and registers this caller on it.
  fn lease<'a>(&'a self, key: &'a K) -> Lease<'a, K, H> {
    let mut table = self.locks.lock();
    let gate = match table.get_mut(key) {
      Some(slot) => {
        slot.leases += 1;
        tracing::trace!(leases = slot.leases, "joining in-flight load");
        Arc::clone(&slot.gate)
      }
      None => {
        let gate = Arc::new(Mutex::new(()));
        table.insert(
          key.clone(),
          KeyLock {
            gate: Arc::clone(&gate),
            leases: 1,
          },
        );
        gate
      }
    };

    Lease {
      table: &self.locks,
      key,
      gate,
    }
  }
}

/// A caller's registration on a lock-table entry.
///
/// Dropping it unregisters the caller and, if it was the last one, removes the
/// entry. Removal is by the cache key the entry was created under.
struct Lease<'a, K, H>
where
  K: Eq + Hash,
  H: BuildHasher,
{
  table: &'a LockTable<K, H>,
  key: &'a K,
  gate: Arc<Mutex<()>>,
}

impl<K, H> Drop for Lease<'_, K, H>
where
  K: Eq + Hash,
  H: BuildHasher,
{
  fn drop(&mut self) {
    let mut table = self.table.lock();
    let last = match table.get_mut(self.key) {
      Some(slot) => {
        slot.leases -= 1;
        slot.leases == 0
      }
      None => false,
    };
    if last {
      table.remove(self.key);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::cell::RefCell;
  use std::collections::HashMap as StdHashMap;

  #[test]
  fn lease_entry_lives_until_last_holder_leaves() {
    let loader: SingleFlightLoader<&str> = SingleFlightLoader::new();

    let first = loader.lease(&"k");
    let second = loader.lease(&"k");
    assert_eq!(loader.lock_table_len(), 1);
    assert!(Arc::ptr_eq(&first.gate, &second.gate));

    drop(first);
    assert_eq!(loader.lock_table_len(), 1);
    drop(second);
    assert_eq!(loader.lock_table_len(), 0);
  }

  #[test]
  fn hit_takes_no_lease() {
    let loader: SingleFlightLoader<u32> = SingleFlightLoader::new();
    let value = loader.get(
      &1,
      |_| panic!("fallback must not run on a hit"),
      |_| CacheResult::Present("cached"),
      |_, _| panic!("populate must not run on a hit"),
    );
    assert_eq!(value, "cached");
    assert_eq!(loader.metrics().hits, 1);
    assert_eq!(loader.lock_table_len(), 0);
  }

  #[test]
  fn miss_runs_fallback_then_populates() {
    let loader: SingleFlightLoader<u32> = SingleFlightLoader::new();
    let store = RefCell::new(StdHashMap::new());

    let value = loader.get(
      &7,
      |key| key * 3,
      |key| store.borrow().get(key).copied().into(),
      |key, value| {
        store.borrow_mut().insert(*key, *value);
      },
    );

    assert_eq!(value, 21);
    assert_eq!(store.borrow().get(&7), Some(&21));
    let metrics = loader.metrics();
    assert_eq!(metrics.misses, 1);
    assert_eq!(metrics.loads, 1);
    assert_eq!(loader.lock_table_len(), 0);
  }
}
