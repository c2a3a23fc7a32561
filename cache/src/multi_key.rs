use crate::cache::{Cache, PartialKey, ResultMap};
use crate::error::{LoadError, LoadResult};
use crate::merge::{merge_results, uncached_keys};
use crate::result::CacheResult;
use crate::single_flight::SingleFlightLoader;

use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A key addressing a stored object by one of its named properties.
///
/// Equality and hashing are structural over both the property name and the
/// property value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CacheKey<P> {
  property: Cow<'static, str>,
  value: P,
}

impl<P> CacheKey<P> {
  pub fn new(property: impl Into<Cow<'static, str>>, value: P) -> Self {
    Self {
      property: property.into(),
      value,
    }
  }

  pub fn property(&self) -> &str {
    &self.property
  }

  pub fn value(&self) -> &P {
    &self.value
  }

  pub fn into_value(self) -> P {
    self.value
  }
}

/// Composite keys match a partial key on their property name, so a scan
/// can collect every object stored under a given property.
impl<P> PartialKey<str> for CacheKey<P> {
  fn matches_partial(&self, partial: &str) -> bool {
    self.property == partial
  }
}

/// Extracts the value of a named property from a stored object.
///
/// Returning `None` means the object has no usable value for that property;
/// the object is then simply not reachable through it.
pub type KeyExtractor<V, P> = Arc<dyn Fn(&str, &V) -> Option<P> + Send + Sync>;

/// Makes one backing cache addressable by several properties of the objects
/// it stores.
///
/// `put` stores an object once per configured property, under
/// `CacheKey { property, value }`, so a product can be found by its code as
/// well as by its id. Lookups name the property they search by.
pub struct MultiKeyCache<P, V, C, H = ahash::RandomState> {
  backing: C,
  properties: Vec<Cow<'static, str>>,
  extractor: KeyExtractor<V, P>,
  loader: SingleFlightLoader<CacheKey<P>, H>,
}

impl<P, V, C, H> fmt::Debug for MultiKeyCache<P, V, C, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MultiKeyCache")
      .field("properties", &self.properties)
      .field("loader", &self.loader)
      .finish_non_exhaustive()
  }
}

impl<P, V, C> MultiKeyCache<P, V, C, ahash::RandomState> {
  pub fn new<I, S, F>(backing: C, properties: I, extractor: F) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<Cow<'static, str>>,
    F: Fn(&str, &V) -> Option<P> + Send + Sync + 'static,
  {
    Self {
      backing,
      properties: properties.into_iter().map(Into::into).collect(),
      extractor: Arc::new(extractor),
      loader: SingleFlightLoader::new(),
    }
  }
}

impl<P, V, C, H> MultiKeyCache<P, V, C, H> {
  pub fn backing(&self) -> &C {
    &self.backing
  }

  pub fn loader(&self) -> &SingleFlightLoader<CacheKey<P>, H> {
    &self.loader
  }

  /// The property names objects are stored under.
  pub fn properties(&self) -> impl Iterator<Item = &str> {
    self.properties.iter().map(|property| property.as_ref())
  }
}

impl<P, V, C, H> MultiKeyCache<P, V, C, H>
where
  P: Eq + Hash + Clone,
  V: Clone,
  C: Cache<CacheKey<P>, V>,
  H: BuildHasher,
{
  /// Builds the key for `property`, reusing the configured name when there is
  /// one so lookups by a static name do not allocate.
  fn key(&self, property: &str, value: P) -> CacheKey<P> {
    let property = self
      .properties
      .iter()
      .find(|configured| *configured == property)
      .cloned()
      .unwrap_or_else(|| Cow::Owned(property.to_owned()));
    CacheKey { property, value }
  }

  fn derived_keys(&self, object: &V) -> Vec<CacheKey<P>> {
    let mut keys = Vec::with_capacity(self.properties.len());
    for property in &self.properties {
      match (self.extractor)(property, object) {
        Some(value) => keys.push(CacheKey {
          property: property.clone(),
          value,
        }),
        None => tracing::trace!(property = %property, "no value for property; key skipped"),
      }
    }
    keys
  }

  /// Stores `object` under every property it has a value for and returns it.
  pub fn put(&self, object: V) -> V {
    for key in self.derived_keys(&object) {
      self.backing.put(key, object.clone());
    }
    object
  }

  pub fn get(&self, property: &str, value: &P) -> CacheResult<V> {
    self.backing.get(&self.key(property, value.clone()))
  }

  /// Looks up `property == value`, falling back to `fallback` on a miss.
  ///
  /// A found object is stored under all of its properties, and also under
  /// the requested key even when its own value for `property` differs, so
  /// the lookup hits next time. Such an alias is not cleared by
  /// [`remove`](Self::remove). Concurrent misses on the same property value
  /// share one `fallback` run. If the fallback finds nothing, nothing is
  /// cached and `None` is returned.
  pub fn get_with<F>(&self, property: &str, value: &P, fallback: F) -> Option<V>
  where
    F: FnOnce(&P) -> Option<V>,
  {
    let key = self.key(property, value.clone());
    self.loader.get(
      &key,
      |key| fallback(key.value()),
      |key| self.backing.get(key).map(Some),
      |key, found| {
        if let Some(object) = found {
          let object = self.put(object.clone());
          if (self.extractor)(key.property(), &object).as_ref() != Some(key.value()) {
            tracing::trace!(property = key.property(), "storing loaded object under the requested key");
            self.backing.put(key.clone(), object);
          }
        }
      },
    )
  }

  /// Returns the cached objects for `property == value` for each of
  /// `values`, in input order, omitting misses.
  pub fn get_all(&self, property: &str, values: &[P]) -> ResultMap<P, V> {
    let keys: Vec<CacheKey<P>> = values
      .iter()
      .map(|value| self.key(property, value.clone()))
      .collect();
    self
      .backing
      .get_all(&keys)
      .into_iter()
      .map(|(key, object)| (key.value, object))
      .collect()
  }

  /// Batch form of [`get_with`](Self::get_with).
  ///
  /// `fallback` receives the uncached property values and returns whatever
  /// objects it found; each is stored under all its properties and matched
  /// back to the request by re-extracting `property`. The ordering rules are
  /// those of [`ReadThroughCache::try_get_all_with`].
  ///
  /// [`ReadThroughCache::try_get_all_with`]: crate::ReadThroughCache::try_get_all_with
  pub fn get_all_with<F>(&self, property: &str, values: &[P], fallback: F) -> LoadResult<ResultMap<P, V>>
  where
    F: FnOnce(&[P]) -> Vec<V>,
  {
    let cached = self.get_all(property, values);
    if cached.len() == values.len() {
      return Ok(cached);
    }

    let uncached = uncached_keys(values, &cached);
    let requested = values.iter().collect::<HashSet<_, ahash::RandomState>>().len();
    if requested - uncached.len() != cached.len() {
      tracing::warn!(
        cache = %self.backing.name(),
        property,
        cached = cached.len(),
        requested,
        "cached subset does not match the requested keys"
      );
      return Err(LoadError::InconsistentKeys {
        cache: self.backing.name().to_string(),
        cached: cached.len(),
        requested,
      });
    }

    if uncached.is_empty() {
      return Ok(cached);
    }

    let mut loaded = ResultMap::with_capacity_and_hasher(uncached.len(), Default::default());
    for object in fallback(&uncached) {
      let object = self.put(object);
      match (self.extractor)(property, &object) {
        Some(value) => {
          loaded.insert(value, object);
        }
        None => tracing::trace!(property, "loaded object has no value for the lookup property"),
      }
    }

    if cached.is_empty() {
      return Ok(loaded);
    }
    Ok(merge_results(values, cached, loaded))
  }

  /// Removes `object` under every property it has a value for. Returns `true`
  /// if any entry was removed.
  pub fn remove(&self, object: &V) -> bool {
    self
      .derived_keys(object)
      .iter()
      .fold(false, |removed, key| self.backing.remove(key) | removed)
  }

  pub fn remove_all(&self) {
    self.backing.remove_all()
  }
}
