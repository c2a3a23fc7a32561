use std::convert::Infallible;

use thiserror::Error;

/// Errors that can occur when building a cache.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
  /// The backing store was configured with zero shards.
  #[error("shard count cannot be zero")]
  ZeroShards,
  /// The cache was given an empty name. Names show up in logs and in
  /// `Cache::name`, so they must be non-empty.
  #[error("cache name cannot be empty")]
  EmptyName,
}

/// Errors returned by batch read-through lookups.
///
/// `E` is the error type of the caller's batch fallback. Lookups whose
/// fallback cannot fail use the default, `Infallible`.
#[derive(Debug, Error)]
pub enum LoadError<E = Infallible> {
  /// The batch fallback failed. The error is passed through untouched.
  #[error("batch fallback failed: {0}")]
  Fallback(E),

  /// The backing store reported cached entries that do not correspond to any
  /// requested key, so the uncached key set could not be derived. This is an
  /// internal invariant violation; the lookup is aborted rather than
  /// returning results in an inconsistent order.
  #[error(
    "cache `{cache}` reported {cached} cached entries that do not match any of the {requested} requested keys"
  )]
  InconsistentKeys {
    cache: String,
    cached: usize,
    requested: usize,
  },
}

impl<E> LoadError<E> {
  /// Returns `true` if this is an internal invariant violation rather than a
  /// fallback failure.
  pub fn is_internal(&self) -> bool {
    matches!(self, LoadError::InconsistentKeys { .. })
  }

  /// Returns the fallback's own error, if that is what failed.
  pub fn into_fallback(self) -> Option<E> {
    match self {
      LoadError::Fallback(err) => Some(err),
      LoadError::InconsistentKeys { .. } => None,
    }
  }
}

/// A specialized `Result` type for batch lookups.
pub type LoadResult<T, E = Infallible> = std::result::Result<T, LoadError<E>>;
