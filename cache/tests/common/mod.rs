#![allow(dead_code)]

use std::any::Any;
use std::hash::Hash;
use std::sync::Arc;

use fibre_readthrough::{Cache, CacheBuilder, CacheResult, MemoryCache, ResultMap};
use parking_lot::Mutex;

// A backing store that records every key written through `put`, so tests can
// assert which entries a read-through lookup populated.
pub struct RecordingCache<K, V> {
  inner: MemoryCache<K, V>,
  puts: Mutex<Vec<K>>,
}

impl<K, V> RecordingCache<K, V>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Clone + Send + Sync + 'static,
{
  pub fn new(name: &str) -> Self {
    Self {
      inner: CacheBuilder::<K, V>::new().name(name).shards(4).build_memory().unwrap(),
      puts: Mutex::new(Vec::new()),
    }
  }

  // Seeds the store without recording the write.
  pub fn seed(&self, key: K, value: V) {
    self.inner.put(key, value);
  }

  pub fn puts(&self) -> Vec<K> {
    self.puts.lock().clone()
  }

  pub fn clear_puts(&self) {
    self.puts.lock().clear();
  }
}

impl<K, V> Cache<K, V> for RecordingCache<K, V>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Clone + Send + Sync + 'static,
{
  fn get(&self, key: &K) -> CacheResult<V> {
    self.inner.get(key)
  }

  fn put(&self, key: K, value: V) -> V {
    self.puts.lock().push(key.clone());
    self.inner.put(key, value)
  }

  fn remove(&self, key: &K) -> bool {
    self.inner.remove(key)
  }

  fn remove_all(&self) {
    self.inner.remove_all()
  }

  fn name(&self) -> &str {
    self.inner.name()
  }

  fn unwrap_any(&self) -> Option<&dyn Any> {
    Some(&self.inner)
  }
}

// A faulty adapter whose native multi-get reports entries for keys that were
// never requested.
pub struct ForeignKeysCache;

impl Cache<String, String> for ForeignKeysCache {
  fn get(&self, _key: &String) -> CacheResult<String> {
    CacheResult::Absent
  }

  fn put(&self, _key: String, value: String) -> String {
    value
  }

  fn remove(&self, _key: &String) -> bool {
    false
  }

  fn remove_all(&self) {}

  fn name(&self) -> &str {
    "foreign-keys"
  }

  fn unwrap_any(&self) -> Option<&dyn Any> {
    None
  }

  fn get_all(&self, _keys: &[String]) -> ResultMap<String, String> {
    let mut found = ResultMap::default();
    found.insert("intruder".to_string(), "x".to_string());
    found
  }
}

pub fn recording_cache(name: &str) -> Arc<RecordingCache<String, String>> {
  Arc::new(RecordingCache::new(name))
}

pub fn keys(names: &[&str]) -> Vec<String> {
  names.iter().map(|name| name.to_string()).collect()
}

pub fn entries<V: Clone>(map: &ResultMap<String, V>) -> Vec<(String, V)> {
  map.iter().map(|(key, value)| (key.clone(), value.clone())).collect()
}
