use fibre_readthrough::{Cache, CacheBuilder, CacheResult, NullCache, PartialKeyCache};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};

#[test]
fn test_null_cache_never_stores() {
  let cache: NullCache<String, u32> = NullCache::new("off");

  assert_eq!(cache.put("a".to_string(), 1), 1);
  assert_eq!(cache.get(&"a".to_string()), CacheResult::Absent);
  assert!(!cache.remove(&"a".to_string()));
  cache.remove_all();

  assert!(cache.get_all(&["a".to_string()]).is_empty());
  assert_eq!(cache.get_by_partial_key(&"a".to_string()), CacheResult::Absent);
  assert_eq!(cache.get_all_by_partial_key(&"a".to_string()), None);
  assert_eq!(cache.name(), "off");
  assert!(cache.unwrap_any().is_none());
}

#[test]
fn test_read_through_null_cache_always_runs_fallback() {
  let cache = CacheBuilder::<u32, u32>::new()
    .build_with(NullCache::default())
    .unwrap();
  assert_eq!(cache.name(), "null");

  let calls = AtomicUsize::new(0);
  for _ in 0..5 {
    let value = cache.get_with(&3, |key| {
      calls.fetch_add(1, Ordering::SeqCst);
      key * 2
    });
    assert_eq!(value, 6);
  }
  assert_eq!(calls.load(Ordering::SeqCst), 5);

  let metrics = cache.metrics();
  assert_eq!(metrics.hits, 0);
  assert_eq!(metrics.loads, 5);
  assert_eq!(cache.loader().lock_table_len(), 0);
}

#[test]
fn test_batch_over_null_cache_returns_fallback_entries() {
  let cache = CacheBuilder::<u32, u32>::new()
    .name("batch-off")
    .build_with(NullCache::new("ignored"))
    .unwrap();
  assert_eq!(cache.name(), "batch-off");

  for _ in 0..2 {
    let result = cache
      .get_all_with(&[1, 2, 3], |uncached| {
        assert_eq!(uncached, &[1, 2, 3]);
        vec![(3, 30), (1, 10)]
      })
      .unwrap();
    let result: Vec<_> = result.into_iter().collect();
    assert_eq!(result, vec![(3, 30), (1, 10)]);
  }
}
