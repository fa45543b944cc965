//! Content-addressed, on-disk response cache.
//!
//! Every successful response body is stored as `<key>.json` inside the cache
//! directory, where `<key>` is a digest of the request identity. Entries never
//! expire: the directory acts as durable memoization across runs, and removing
//! it forces a full re-fetch.

mod storage;
mod traits;

pub use storage::CacheStore;
pub use traits::{CacheKey, CacheSource, QueryKey};
