//! Core traits and types for the response cache.

use std::fmt;

/// Fixed-length hex digest identifying one cached response.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
  /// Wrap an already computed hex digest.
  pub fn from_digest(hex_digest: String) -> Self {
    Self(hex_digest)
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  /// File name of the cache entry for this key.
  pub fn file_name(&self) -> String {
    format!("{}.json", self.as_str())
  }
}

impl fmt::Display for CacheKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// Trait for request identities that can be used as cache lookup keys.
///
/// Implementors must hash their full identity: two values that would hit the
/// server with the same request must produce the same key, and any difference
/// in identity must produce a different key.
pub trait QueryKey {
  /// Stable digest of the request identity.
  fn cache_key(&self) -> CacheKey;

  /// Human-readable description for logging.
  fn description(&self) -> String;
}

/// Where a response body came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Body was fetched from the network (and has just been stored)
  Network,
  /// Body was served from an existing cache entry
  Cache,
}
