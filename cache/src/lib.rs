//! Read-through cache coordination over any key/value backing store.
//!
//! # Features
//! - **Presence-Aware Lookups**: Every read returns a [`CacheResult`], so a
//!   cached "empty" value is never confused with a missing entry.
//! - **Single-Flight Misses**: Concurrent misses on the same key run the
//!   fallback once; misses on different keys never wait on each other.
//! - **Batch Gap-Filling**: Batch lookups load only the uncached keys and
//!   return results in the caller's key order.
//! - **Pluggable Stores**: Anything implementing the [`Cache`] contract can
//!   back the layer; [`MemoryCache`] and the always-miss [`NullCache`] ship
//!   with the crate.
//! - **Multi-Key Access**: [`MultiKeyCache`] stores an object once per named
//!   property so it can be found by any of them.
//!
//! # Example
//!
//! ```
//! use fibre_readthrough::{Cache, CacheBuilder};
//!
//! let cache = CacheBuilder::default().name("prices").build().unwrap();
//!
//! let price = cache.get_with(&"sku-1".to_string(), |_sku| 1999u64);
//! assert_eq!(price, 1999);
//! assert!(cache.get(&"sku-1".to_string()).is_present());
//! ```

// Public modules that form the API
pub mod builder;
pub mod cache;
pub mod error;
pub mod memory;
pub mod merge;
pub mod metrics;
pub mod multi_key;
pub mod null;
pub mod read_through;
pub mod result;
pub mod single_flight;

// Re-export the primary user-facing types for convenience
pub use builder::CacheBuilder;
pub use cache::{Cache, CacheExt, PartialKey, PartialKeyCache, ResultMap};
pub use error::{BuildError, LoadError, LoadResult};
pub use memory::MemoryCache;
pub use metrics::MetricsSnapshot;
pub use multi_key::{CacheKey, KeyExtractor, MultiKeyCache};
pub use null::NullCache;
pub use read_through::{ReadThroughCache, Sanitizer};
pub use result::CacheResult;
pub use single_flight::SingleFlightLoader;
