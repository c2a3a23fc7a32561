mod common;

use common::{entries, keys, recording_cache, ForeignKeysCache};
use fibre_readthrough::{Cache, CacheBuilder, LoadError, ReadThroughCache};
use pretty_assertions::assert_eq;
use std::cell::Cell;
use std::sync::Arc;

fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
  items
    .iter()
    .map(|(key, value)| (key.to_string(), value.to_string()))
    .collect()
}

#[test]
fn test_get_all_with_fully_cached_skips_fallback() {
  let backing = recording_cache("fully-cached");
  backing.seed("a".to_string(), "1".to_string());
  backing.seed("b".to_string(), "2".to_string());
  let cache = ReadThroughCache::new(backing.clone());

  let result = cache
    .get_all_with(&keys(&["b", "a"]), |_| -> Vec<(String, String)> {
      panic!("fallback must not run when every key is cached")
    })
    .unwrap();

  assert_eq!(entries(&result), pairs(&[("b", "2"), ("a", "1")]));
  assert!(backing.puts().is_empty());
}

#[test]
fn test_get_all_with_partial_hit_loads_only_gaps() {
  let backing = recording_cache("partial");
  backing.seed("B".to_string(), "cached-b".to_string());
  let cache = ReadThroughCache::new(backing.clone());

  let seen = Cell::new(None);
  let result = cache
    .get_all_with(&keys(&["A", "B", "C"]), |uncached| {
      seen.set(Some(uncached.to_vec()));
      // Deliberately return the loaded entries out of request order.
      pairs(&[("C", "loaded-c"), ("A", "loaded-a")])
    })
    .unwrap();

  assert_eq!(seen.take(), Some(keys(&["A", "C"])));
  assert_eq!(
    entries(&result),
    pairs(&[("A", "loaded-a"), ("B", "cached-b"), ("C", "loaded-c")])
  );

  // Only the loaded entries were written back.
  let mut written = backing.puts();
  written.sort();
  assert_eq!(written, keys(&["A", "C"]));
  assert!(cache.get(&"A".to_string()).is_present());
  assert!(cache.get(&"C".to_string()).is_present());
}

#[test]
fn test_get_all_with_nothing_cached_keeps_fallback_order() {
  let backing = recording_cache("cold");
  let cache = ReadThroughCache::new(backing.clone());

  let result = cache
    .get_all_with(&keys(&["x", "y", "z"]), |uncached| {
      assert_eq!(uncached, keys(&["x", "y", "z"]).as_slice());
      pairs(&[("z", "3"), ("x", "1"), ("y", "2")])
    })
    .unwrap();

  assert_eq!(entries(&result), pairs(&[("z", "3"), ("x", "1"), ("y", "2")]));
  assert_eq!(backing.puts(), keys(&["z", "x", "y"]));
}

#[test]
fn test_get_all_with_omits_keys_the_fallback_did_not_find() {
  let backing = recording_cache("sparse");
  backing.seed("a".to_string(), "1".to_string());
  let cache = ReadThroughCache::new(backing.clone());

  let result = cache
    .get_all_with(&keys(&["a", "missing", "c"]), |_| pairs(&[("c", "3")]))
    .unwrap();

  assert_eq!(entries(&result), pairs(&[("a", "1"), ("c", "3")]));
  assert!(cache.get(&"missing".to_string()).is_absent());
}

#[test]
fn test_get_all_with_drops_unrequested_entries_when_merging() {
  let backing = recording_cache("extra");
  backing.seed("a".to_string(), "1".to_string());
  let cache = ReadThroughCache::new(backing.clone());

  let result = cache
    .get_all_with(&keys(&["a", "b"]), |_| pairs(&[("b", "2"), ("bonus", "9")]))
    .unwrap();

  assert_eq!(entries(&result), pairs(&[("a", "1"), ("b", "2")]));
  // The extra entry is still written back, it just is not returned.
  assert!(backing.get(&"bonus".to_string()).is_present());
}

#[test]
fn test_get_all_with_duplicate_keys() {
  let backing = recording_cache("dupes");
  backing.seed("a".to_string(), "1".to_string());
  let cache = ReadThroughCache::new(backing.clone());

  // Everything requested is cached, even though the list has repeats.
  let cached_only = cache
    .get_all_with(&keys(&["a", "a"]), |_| -> Vec<(String, String)> {
      panic!("fallback must not run when every distinct key is cached")
    })
    .unwrap();
  assert_eq!(entries(&cached_only), pairs(&[("a", "1")]));

  let seen = Cell::new(None);
  let mixed = cache
    .get_all_with(&keys(&["b", "a", "b"]), |uncached| {
      seen.set(Some(uncached.to_vec()));
      pairs(&[("b", "2")])
    })
    .unwrap();
  assert_eq!(seen.take(), Some(keys(&["b"])));
  assert_eq!(entries(&mixed), pairs(&[("b", "2"), ("a", "1")]));
}

#[test]
fn test_get_all_with_empty_request() {
  let cache = CacheBuilder::<String, String>::new().build().unwrap();
  let result = cache
    .get_all_with(&[], |_| -> Vec<(String, String)> {
      panic!("nothing to load")
    })
    .unwrap();
  assert!(result.is_empty());
}

#[test]
fn test_try_get_all_with_propagates_fallback_error() {
  let backing = recording_cache("failing");
  backing.seed("a".to_string(), "1".to_string());
  let cache = ReadThroughCache::new(backing.clone());

  let err = cache
    .try_get_all_with(&keys(&["a", "b"]), |_| {
      Err::<Vec<(String, String)>, _>("database unavailable")
    })
    .unwrap_err();

  assert!(!err.is_internal());
  assert_eq!(err.to_string(), "batch fallback failed: database unavailable");
  assert_eq!(err.into_fallback(), Some("database unavailable"));
  assert!(backing.puts().is_empty(), "a failed batch must not write anything");
}

#[test]
fn test_inconsistent_cached_subset_is_an_error() {
  let cache = ReadThroughCache::new(ForeignKeysCache);

  let err = cache
    .get_all_with(&keys(&["a", "b"]), |_| -> Vec<(String, String)> {
      panic!("fallback must not run after an invariant violation")
    })
    .unwrap_err();

  assert!(err.is_internal());
  match err {
    LoadError::InconsistentKeys {
      cache,
      cached,
      requested,
    } => {
      assert_eq!(cache, "foreign-keys");
      assert_eq!(cached, 1);
      assert_eq!(requested, 2);
    }
    other => panic!("unexpected error: {other:?}"),
  }
}

#[test]
fn test_batch_loads_are_sanitized_and_counted() {
  let backing = recording_cache("sanitized");
  let cache = CacheBuilder::<String, String>::new()
    .sanitizer(|value: String| value.trim().to_string())
    .build_with(backing.clone())
    .unwrap();

  let result = cache
    .get_all_with(&keys(&["a", "b"]), |_| pairs(&[("a", "  one "), ("b", "two\n")]))
    .unwrap();

  assert_eq!(entries(&result), pairs(&[("a", "one"), ("b", "two")]));
  assert_eq!(backing.get(&"a".to_string()).into_value(), Some("one".to_string()));

  let metrics = cache.metrics();
  assert_eq!(metrics.batch_loads, 1);
  assert_eq!(metrics.batch_keys_loaded, 2);
}

#[test]
fn test_get_all_with_over_shared_backing() {
  // Two layers over the same store see each other's batch loads.
  let backing = recording_cache("shared");
  let first = ReadThroughCache::new(Arc::clone(&backing));
  let second = ReadThroughCache::new(Arc::clone(&backing));

  first
    .get_all_with(&keys(&["k"]), |_| pairs(&[("k", "v")]))
    .unwrap();
  let result = second
    .get_all_with(&keys(&["k"]), |_| -> Vec<(String, String)> {
      panic!("already loaded through the other layer")
    })
    .unwrap();
  assert_eq!(entries(&result), pairs(&[("k", "v")]));
}
