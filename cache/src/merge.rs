//! Helpers shared by the batch lookups of [`ReadThroughCache`] and
//! [`MultiKeyCache`].
//!
//! [`ReadThroughCache`]: crate::ReadThroughCache
//! [`MultiKeyCache`]: crate::MultiKeyCache

use crate::cache::ResultMap;

use std::collections::HashSet;
use std::hash::Hash;

/// Returns the keys of `keys` that are not in `cached`, in input order and
/// without duplicates.
pub fn uncached_keys<K, V>(keys: &[K], cached: &ResultMap<K, V>) -> Vec<K>
where
  K: Eq + Hash + Clone,
{
  let mut seen: HashSet<&K, ahash::RandomState> = HashSet::default();
  keys
    .iter()
    .filter(|key| !cached.contains_key(*key) && seen.insert(*key))
    .cloned()
    .collect()
}

/// Lays out a batch result in the caller's key order.
///
/// For every key, the cached value wins over the freshly loaded one; keys
/// found in neither map are left out. Entries of `loaded` that were never
/// requested are dropped.
pub fn merge_results<K, V>(
  keys: &[K],
  mut cached: ResultMap<K, V>,
  mut loaded: ResultMap<K, V>,
) -> ResultMap<K, V>
where
  K: Eq + Hash + Clone,
{
  let mut merged = ResultMap::with_capacity_and_hasher(keys.len(), Default::default());
  for key in keys {
    if merged.contains_key(key) {
      continue;
    }
    let value = cached
      .swap_remove(key)
      .or_else(|| loaded.swap_remove(key));
    if let Some(value) = value {
      merged.insert(key.clone(), value);
    }
  }
  merged
}

#[cfg(test)]
mod tests {
  use super::*;

  fn map(entries: &[(&'static str, u32)]) -> ResultMap<&'static str, u32> {
    entries.iter().copied().collect()
  }

  #[test]
  fn uncached_keys_keep_input_order() {
    let cached = map(&[("b", 2)]);
    let keys = ["c", "b", "a", "c"];
    assert_eq!(uncached_keys(&keys, &cached), vec!["c", "a"]);
  }

  #[test]
  fn merge_prefers_cached_and_follows_key_order() {
    let cached = map(&[("b", 20)]);
    let loaded = map(&[("c", 3), ("b", 2), ("a", 1), ("z", 26)]);

    let merged = merge_results(&["a", "b", "c", "d"], cached, loaded);

    let entries: Vec<_> = merged.into_iter().collect();
    assert_eq!(entries, vec![("a", 1), ("b", 20), ("c", 3)]);
  }
}
