#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The outcome of a single cache read.
///
/// `Present` carries whatever the backing store held for the key, including
/// a stored "empty" value such as `None` when `V = Option<T>`. `Absent` means
/// the store had no entry at all, so callers never confuse "not computed yet"
/// with "computed and empty".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CacheResult<V> {
  /// The backing store holds an entry for the key.
  Present(V),
  /// The backing store holds no entry for the key.
  Absent,
}

impl<V> Default for CacheResult<V> {
  fn default() -> Self {
    CacheResult::Absent
  }
}

impl<V> CacheResult<V> {
  pub fn present(value: V) -> Self {
    CacheResult::Present(value)
  }

  pub fn absent() -> Self {
    CacheResult::Absent
  }

  pub fn is_present(&self) -> bool {
    matches!(self, CacheResult::Present(_))
  }

  pub fn is_absent(&self) -> bool {
    matches!(self, CacheResult::Absent)
  }

  /// Borrows the cached value, if any.
  pub fn value(&self) -> Option<&V> {
    match self {
      CacheResult::Present(value) => Some(value),
      CacheResult::Absent => None,
    }
  }

  /// Consumes the result, returning the cached value, if any.
  pub fn into_value(self) -> Option<V> {
    match self {
      CacheResult::Present(value) => Some(value),
      CacheResult::Absent => None,
    }
  }

  pub fn as_ref(&self) -> CacheResult<&V> {
    match self {
      CacheResult::Present(value) => CacheResult::Present(value),
      CacheResult::Absent => CacheResult::Absent,
    }
  }

  pub fn map<U, F>(self, f: F) -> CacheResult<U>
  where
    F: FnOnce(V) -> U,
  {
    match self {
      CacheResult::Present(value) => CacheResult::Present(f(value)),
      CacheResult::Absent => CacheResult::Absent,
    }
  }

  /// Returns the cached value, or computes one when the key was absent.
  ///
  /// The computed value is not written anywhere; use a read-through cache
  /// for that.
  pub fn unwrap_or_else<F>(self, f: F) -> V
  where
    F: FnOnce() -> V,
  {
    match self {
      CacheResult::Present(value) => value,
      CacheResult::Absent => f(),
    }
  }

  /// Chains a second lookup that only runs when this one missed.
  pub fn or_else<F>(self, f: F) -> CacheResult<V>
  where
    F: FnOnce() -> CacheResult<V>,
  {
    match self {
      CacheResult::Present(value) => CacheResult::Present(value),
      CacheResult::Absent => f(),
    }
  }
}

impl<V> From<CacheResult<V>> for Option<V> {
  fn from(result: CacheResult<V>) -> Self {
    result.into_value()
  }
}

impl<V> From<Option<V>> for CacheResult<V> {
  fn from(value: Option<V>) -> Self {
    match value {
      Some(value) => CacheResult::Present(value),
      None => CacheResult::Absent,
    }
  }
}
