//! Cache key derivation for Jira requests.

use sha2::{Digest, Sha256};

use crate::cache::{CacheKey, QueryKey};

use super::request::RequestDescriptor;

impl QueryKey for RequestDescriptor {
  fn cache_key(&self) -> CacheKey {
    // SHA256 hash of the canonical URL for stable, fixed-length keys
    let mut hasher = Sha256::new();
    hasher.update(self.url().as_str().as_bytes());
    let result = hasher.finalize();
    CacheKey::from_digest(hex::encode(result))
  }

  fn description(&self) -> String {
    match self.param("startAt") {
      Some(start_at) => format!("search page at {}", start_at),
      None => "search first page".to_string(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::jira::request::Credentials;
  use url::Url;

  fn search(jql: &str) -> RequestDescriptor {
    let endpoint = Url::parse("https://example.atlassian.net/rest/api/3/search").unwrap();
    let creds = Credentials {
      username: "user".to_string(),
      token: "token".to_string(),
    };
    RequestDescriptor::new(endpoint, creds)
      .with_param("jql", jql)
      .with_param("maxResults", "100")
  }

  #[test]
  fn test_key_is_deterministic() {
    assert_eq!(search("project = ABC").cache_key(), search("project = ABC").cache_key());
  }

  #[test]
  fn test_key_is_fixed_length_hex() {
    let key = search("project = ABC").cache_key();
    assert_eq!(key.as_str().len(), 64);
    assert!(key.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(key.file_name(), format!("{}.json", key));
  }

  #[test]
  fn test_differing_params_give_differing_keys() {
    let base = search("project = ABC");
    let keys = [
      base.cache_key(),
      search("project = ABD").cache_key(),
      base.with_param("startAt", "100").cache_key(),
      base.with_param("startAt", "200").cache_key(),
      base.with_param("maxResults", "50").cache_key(),
    ];
    for (i, a) in keys.iter().enumerate() {
      for b in &keys[i + 1..] {
        assert_ne!(a, b);
      }
    }
  }

  #[test]
  fn test_credentials_do_not_affect_key() {
    let a = search("project = ABC");
    let endpoint = Url::parse("https://example.atlassian.net/rest/api/3/search").unwrap();
    let other = Credentials {
      username: "someone-else".to_string(),
      token: "other".to_string(),
    };
    let b = RequestDescriptor::new(endpoint, other)
      .with_param("maxResults", "100")
      .with_param("jql", "project = ABC");
    assert_eq!(a.cache_key(), b.cache_key());
  }

  #[test]
  fn test_description_names_page() {
    let base = search("project = ABC");
    assert_eq!(base.description(), "search first page");
    assert_eq!(base.with_param("startAt", "200").description(), "search page at 200");
  }
}
