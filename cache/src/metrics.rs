use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crossbeam_utils::CachePadded;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A thread-safe, internal metrics collector for a read-through loader.
/// All fields are atomic to allow for lock-free updates.
#[derive(Debug)]
pub(crate) struct Metrics {
  // --- Hit/Miss Ratios ---
  pub(crate) hits: CachePadded<AtomicU64>,
  pub(crate) misses: CachePadded<AtomicU64>,
  pub(crate) coalesced: CachePadded<AtomicU64>,

  // --- Fallback Evaluations ---
  pub(crate) loads: CachePadded<AtomicU64>,
  pub(crate) load_failures: CachePadded<AtomicU64>,
  pub(crate) batch_loads: CachePadded<AtomicU64>,
  pub(crate) batch_keys_loaded: CachePadded<AtomicU64>,

  created_at: Instant,
}

// Manual implementation of Default to handle the non-default `Instant`.
impl Default for Metrics {
  fn default() -> Self {
    Self {
      hits: CachePadded::new(AtomicU64::new(0)),
      misses: CachePadded::new(AtomicU64::new(0)),
      coalesced: CachePadded::new(AtomicU64::new(0)),
      loads: CachePadded::new(AtomicU64::new(0)),
      load_failures: CachePadded::new(AtomicU64::new(0)),
      batch_loads: CachePadded::new(AtomicU64::new(0)),
      batch_keys_loaded: CachePadded::new(AtomicU64::new(0)),
      created_at: Instant::now(),
    }
  }
}

impl Metrics {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  /// Creates a point-in-time snapshot of the current metrics.
  pub(crate) fn snapshot(&self) -> MetricsSnapshot {
    let hits = self.hits.load(Ordering::Relaxed);
    let misses = self.misses.load(Ordering::Relaxed);
    let total_lookups = hits + misses;

    MetricsSnapshot {
      hits,
      misses,
      hit_ratio: if total_lookups == 0 {
        0.0
      } else {
        hits as f64 / total_lookups as f64
      },
      coalesced: self.coalesced.load(Ordering::Relaxed),
      loads: self.loads.load(Ordering::Relaxed),
      load_failures: self.load_failures.load(Ordering::Relaxed),
      batch_loads: self.batch_loads.load(Ordering::Relaxed),
      batch_keys_loaded: self.batch_keys_loaded.load(Ordering::Relaxed),
      uptime_secs: self.created_at.elapsed().as_secs(),
    }
  }
}

/// A point-in-time, public-facing snapshot of a loader's metrics.
#[derive(Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MetricsSnapshot {
  /// Lookups answered by the cache without taking any lock.
  pub hits: u64,
  /// Lookups that missed on the first check and went on to the per-key lock.
  pub misses: u64,
  /// The fast-path hit ratio (hits / (hits + misses)).
  pub hit_ratio: f64,
  /// Misses that found the value on the re-check after waiting for the
  /// per-key lock, i.e. callers that piggybacked on another caller's load.
  pub coalesced: u64,
  /// Single-key fallback evaluations.
  pub loads: u64,
  /// Single-key fallback evaluations that returned an error.
  pub load_failures: u64,
  /// Batch fallback invocations.
  pub batch_loads: u64,
  /// Entries returned by batch fallbacks and written back to the cache.
  pub batch_keys_loaded: u64,
  /// The number of seconds since the loader was created.
  pub uptime_secs: u64,
}

impl fmt::Debug for MetricsSnapshot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MetricsSnapshot")
      .field("hits", &self.hits)
      .field("misses", &self.misses)
      .field("hit_ratio", &format!("{:.2}%", self.hit_ratio * 100.0))
      .field("coalesced", &self.coalesced)
      .field("loads", &self.loads)
      .field("load_failures", &self.load_failures)
      .field("batch_loads", &self.batch_loads)
      .field("batch_keys_loaded", &self.batch_keys_loaded)
      .field("uptime_secs", &self.uptime_secs)
      .finish()
  }
}
