use crate::cache::CacheStore;
use crate::config::{Config, Secrets};
use crate::fetch::{AggregatedResult, FetchError, FetchOrchestrator};
use crate::jira::request::{Credentials, RequestDescriptor};
use color_eyre::{eyre::eyre, Result};
use tracing::debug;
use url::Url;

const SEARCH_PATH: &str = "/rest/api/3/search";

/// Jira search client backed by the cached, retrying fetch layer
#[derive(Debug, Clone)]
pub struct JiraClient {
  orchestrator: FetchOrchestrator,
  search_url: Url,
  credentials: Credentials,
  max_results: u64,
}

impl JiraClient {
  pub fn new(config: &Config, secrets: &Secrets) -> Result<Self> {
    let search_url = Url::parse(&format!("{}{}", secrets.url.trim_end_matches('/'), SEARCH_PATH))
      .map_err(|e| eyre!("Invalid Jira URL {}: {}", secrets.url, e))?;

    let http = reqwest::Client::builder()
      .user_agent(concat!("jira-export/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    let cache = CacheStore::open(&config.cache).map_err(|e| {
      eyre!(
        "Failed to create cache directory {}: {}",
        config.cache.dir.display(),
        e
      )
    })?;
    debug!(cache_dir = %cache.dir().display(), "Opened response cache");

    Ok(Self {
      orchestrator: FetchOrchestrator::new(http, cache, config),
      search_url,
      credentials: Credentials {
        username: secrets.username.clone(),
        token: secrets.token.clone(),
      },
      max_results: config.fetch.max_results,
    })
  }

  /// First page request for a JQL query
  pub fn search_request(&self, jql: &str) -> RequestDescriptor {
    RequestDescriptor::new(self.search_url.clone(), self.credentials.clone())
      .with_param("jql", jql)
      .with_param("maxResults", self.max_results.to_string())
  }

  /// Search for issues using JQL, fetching every page
  pub async fn search_issues(&self, jql: &str) -> Result<AggregatedResult, FetchError> {
    debug!(jql, "Searching Jira issues");
    let request = self.search_request(jql);
    self.orchestrator.fetch_all(&request).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::{CacheConfig, RetryConfig};
  use serde_json::json;
  use wiremock::matchers::{header, method, path, query_param};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn client(server_uri: &str, dir: &std::path::Path) -> JiraClient {
    let mut config = Config::default();
    config.cache = CacheConfig {
      dir: dir.join("cache"),
    };
    config.retry = RetryConfig {
      base_delay_ms: 1,
      max_delay_ms: 4,
      ..RetryConfig::default()
    };
    let secrets = Secrets {
      username: "user".to_string(),
      token: "token".to_string(),
      url: format!("{}/", server_uri),
    };
    JiraClient::new(&config, &secrets).unwrap()
  }

  #[test]
  fn test_search_request_params() {
    let tmp = tempfile::tempdir().unwrap();
    let client = client("https://example.atlassian.net", tmp.path());
    let request = client.search_request("project = ABC");

    assert_eq!(request.param("jql"), Some("project = ABC"));
    assert_eq!(request.param("maxResults"), Some("100"));
    assert_eq!(request.param("startAt"), None);
    assert_eq!(request.url().path(), "/rest/api/3/search");
  }

  #[test]
  fn test_invalid_url_is_error() {
    let tmp = tempfile::tempdir().unwrap();
    let secrets = Secrets {
      username: "user".to_string(),
      token: "token".to_string(),
      url: "not a url".to_string(),
    };
    let mut config = Config::default();
    config.cache.dir = tmp.path().join("cache");
    assert!(JiraClient::new(&config, &secrets).is_err());
  }

  #[tokio::test]
  async fn test_search_sends_basic_auth_and_json_headers() {
    let server = MockServer::start().await;
    let tmp = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
      .and(path("/rest/api/3/search"))
      .and(query_param("jql", "project = ABC"))
      .and(query_param("maxResults", "100"))
      // base64("user:token")
      .and(header("authorization", "Basic dXNlcjp0b2tlbg=="))
      .and(header("accept", "application/json"))
      .and(header("content-type", "application/json"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "startAt": 0,
        "maxResults": 100,
        "total": 2,
        "issues": [{ "key": "ABC-1" }, { "key": "ABC-2" }],
      })))
      .expect(1)
      .mount(&server)
      .await;

    let result = client(&server.uri(), tmp.path())
      .search_issues("project = ABC")
      .await
      .unwrap();
    assert_eq!(result.total, 2);
    assert_eq!(result.issues[1]["key"], "ABC-2");
  }
}
