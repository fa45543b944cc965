//! Immutable description of one search request.

use std::collections::BTreeMap;
use std::fmt;

use url::Url;

/// Static credential pair sent as HTTP Basic auth.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
  pub username: String,
  pub token: String,
}

impl fmt::Debug for Credentials {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Credentials")
      .field("username", &self.username)
      .field("token", &"<redacted>")
      .finish()
  }
}

/// A read-only GET against a search endpoint.
///
/// Query parameters are kept sorted by name, so the encoded URL is canonical:
/// two descriptors are the same request exactly when [`RequestDescriptor::url`]
/// renders the same string. Credentials are not part of that identity.
///
/// Descriptors never change after construction; [`RequestDescriptor::with_param`]
/// returns a new value, so a cache key derived from one descriptor always stays
/// valid for it.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
  endpoint: Url,
  params: BTreeMap<String, String>,
  credentials: Credentials,
}

impl RequestDescriptor {
  /// Create a descriptor for an endpoint. Any query string already present on
  /// `endpoint` is folded into the parameter set.
  pub fn new(mut endpoint: Url, credentials: Credentials) -> Self {
    let params = endpoint
      .query_pairs()
      .map(|(k, v)| (k.into_owned(), v.into_owned()))
      .collect();
    endpoint.set_query(None);
    endpoint.set_fragment(None);

    Self {
      endpoint,
      params,
      credentials,
    }
  }

  /// Copy of this descriptor with one query parameter set (added or replaced).
  pub fn with_param(&self, key: &str, value: impl Into<String>) -> Self {
    let mut next = self.clone();
    next.params.insert(key.to_string(), value.into());
    next
  }

  pub fn param(&self, key: &str) -> Option<&str> {
    self.params.get(key).map(String::as_str)
  }

  pub fn credentials(&self) -> &Credentials {
    &self.credentials
  }

  /// Fully encoded URL with parameters in canonical order.
  pub fn url(&self) -> Url {
    let mut url = self.endpoint.clone();
    if !self.params.is_empty() {
      url.query_pairs_mut().extend_pairs(&self.params);
    }
    url
  }
}
