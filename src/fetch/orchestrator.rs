//! Cached, retrying fetch of one search result set.

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use url::Url;

use super::backoff::{NetworkBackoff, RateLimitBackoff};
use super::batch::BatchRunner;
use super::error::FetchError;
use super::pagination::{self, PageRequest};
use super::rate_limit::is_rate_limit_page;
use crate::cache::{CacheKey, CacheSource, CacheStore, QueryKey};
use crate::config::{Config, FetchConfig, RetryConfig};
use crate::jira::api_types::{self, PageError, SearchPage};
use crate::jira::request::RequestDescriptor;

/// Every issue of a result set.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedResult {
  /// First page's issues, then each follow-up page's issues in completion order
  pub issues: Vec<Value>,
  /// `total` as reported by the first page
  pub total: u64,
  /// Pages fetched, including the first
  pub pages: usize,
}

/// A retryable condition seen by one attempt.
#[derive(Debug)]
enum Failure {
  Transport(reqwest::Error),
  Status(StatusCode),
  RateLimited,
}

impl fmt::Display for Failure {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Failure::Transport(e) => write!(f, "error sending request: {}", e),
      Failure::Status(status) => write!(f, "unexpected status {}", status),
      Failure::RateLimited => write!(f, "rate limited"),
    }
  }
}

/// Result of one pass through cache and network.
enum Attempt {
  Body(Vec<u8>, CacheSource),
  Failed(Failure),
}

/// Drives every request of a search through cache, retries and pagination.
///
/// A single request runs this loop until it reaches a terminal state:
/// - cache hit, or network call on a miss (2xx bodies are cached)
/// - 401: terminal, never retried
/// - other non-2xx or transport error: network backoff, then retry
/// - 2xx HTML page: cache entry removed, rate-limit backoff, then retry
/// - 2xx JSON: decoded; `errorMessages` or undecodable bodies are terminal
#[derive(Debug, Clone)]
pub struct FetchOrchestrator {
  http: reqwest::Client,
  cache: CacheStore,
  retry: RetryConfig,
  fetch: FetchConfig,
  diagnostics_file: PathBuf,
}

impl FetchOrchestrator {
  pub fn new(http: reqwest::Client, cache: CacheStore, config: &Config) -> Self {
    Self {
      http,
      cache,
      retry: config.retry.clone(),
      fetch: config.fetch.clone(),
      diagnostics_file: config.output.diagnostics_file.clone(),
    }
  }

  /// Fetch the first page described by `first`, then every follow-up page.
  ///
  /// Follow-up pages are requested in concurrent batches. Any terminal failure
  /// fails the whole fetch; there is no partial result. When that failure is an
  /// undecodable body, the body is written to the diagnostics file.
  pub async fn fetch_all(&self, first: &RequestDescriptor) -> Result<AggregatedResult, FetchError> {
    match self.fetch_pages(first).await {
      Ok(result) => Ok(result),
      Err(e) => Err(self.preserve_body(e).await),
    }
  }

  async fn fetch_pages(&self, first: &RequestDescriptor) -> Result<AggregatedResult, FetchError> {
    let first_page = self.fetch_page(first).await?;
    let total = first_page.total;
    let max_results = first_page.max_results;
    info!(total, max_results, "Fetched first page");

    let mut issues = first_page.issues;
    if total <= max_results {
      return Ok(AggregatedResult {
        issues,
        total,
        pages: 1,
      });
    }

    let plan = pagination::plan(max_results, total, self.fetch.page_size);
    info!(
      follow_up_pages = plan.len(),
      batch_size = self.fetch.batch_size,
      "Fetching additional results"
    );

    let runner = BatchRunner::new(self.fetch.batch_size);
    let pages = runner
      .run(plan.iter().map(|page| self.fetch_follow_up(first, *page)))
      .await?;

    let fetched = pages.len() + 1;
    for page in pages {
      issues.extend(page.issues);
    }

    Ok(AggregatedResult {
      issues,
      total,
      pages: fetched,
    })
  }

  async fn fetch_follow_up(
    &self,
    first: &RequestDescriptor,
    page: PageRequest,
  ) -> Result<SearchPage, FetchError> {
    let request = first
      .with_param("startAt", page.start_at.to_string())
      .with_param("maxResults", page.page_size.to_string());

    let result = self
      .fetch_page(&request)
      .await
      .map_err(|e| FetchError::Batch {
        start_at: page.start_at,
        source: Box::new(e),
      })?;
    debug!(
      start_at = result.start_at,
      issues = result.issues.len(),
      "Fetched follow-up page"
    );
    Ok(result)
  }

  /// Fetch and decode a single page, retrying transient conditions.
  async fn fetch_page(&self, request: &RequestDescriptor) -> Result<SearchPage, FetchError> {
    let key = request.cache_key();
    let url = request.url();
    let started = Instant::now();
    let mut network = NetworkBackoff::from_config(&self.retry);
    let mut rate_limit = RateLimitBackoff::from_config(&self.retry);
    let mut failures = 0u32;

    loop {
      let failure = match self.attempt(request, &key, &url).await? {
        Attempt::Body(body, source) => {
          network.reset();
          if is_rate_limit_page(&body) {
            self.cache.invalidate(&key).await?;
            Failure::RateLimited
          } else {
            debug!(url = %url, ?source, bytes = body.len(), "Received page");
            return self.decode(&url, &key, body).await;
          }
        }
        Attempt::Failed(failure) => failure,
      };

      failures += 1;
      self.check_retry_budget(&url, failures, started, &failure)?;

      let delay = match failure {
        Failure::RateLimited => rate_limit.next_delay(),
        _ => network.next_delay(),
      };
      warn!(
        url = %url,
        page = %request.description(),
        failure = %failure,
        attempt = failures,
        delay_ms = delay.as_millis() as u64,
        "Request failed, retrying"
      );
      tokio::time::sleep(delay).await;
    }
  }

  /// One pass: cache lookup, then the network on a miss.
  async fn attempt(
    &self,
    request: &RequestDescriptor,
    key: &CacheKey,
    url: &Url,
  ) -> Result<Attempt, FetchError> {
    if let Some(body) = self.cache.get(key).await? {
      return Ok(Attempt::Body(body, CacheSource::Cache));
    }

    let credentials = request.credentials();
    let sent = self
      .http
      .get(url.clone())
      .basic_auth(&credentials.username, Some(&credentials.token))
      .header(ACCEPT, "application/json")
      .header(CONTENT_TYPE, "application/json")
      .send()
      .await;

    let response = match sent {
      Ok(response) => response,
      Err(e) => return Ok(Attempt::Failed(Failure::Transport(e))),
    };

    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
      error!(url = %url, "Authentication failed");
      return Err(FetchError::Authentication {
        url: url.to_string(),
      });
    }

    let body = match response.bytes().await {
      Ok(body) => body.to_vec(),
      Err(e) => return Ok(Attempt::Failed(Failure::Transport(e))),
    };

    if !status.is_success() {
      // A rejected query never succeeds on retry, whatever the status
      if let Some(messages) = api_types::error_messages(&body) {
        return Err(FetchError::Query { messages });
      }
      return Ok(Attempt::Failed(Failure::Status(status)));
    }

    self.cache.put(key, &body).await?;
    Ok(Attempt::Body(body, CacheSource::Network))
  }

  fn check_retry_budget(
    &self,
    url: &Url,
    failures: u32,
    started: Instant,
    failure: &Failure,
  ) -> Result<(), FetchError> {
    let over_attempts = self.retry.max_attempts.is_some_and(|max| failures > max);
    let over_time = self
      .retry
      .max_elapsed()
      .is_some_and(|max| started.elapsed() >= max);

    if over_attempts || over_time {
      error!(url = %url, attempts = failures, failure = %failure, "Retry limit reached");
      return Err(FetchError::RetriesExhausted {
        url: url.to_string(),
        attempts: failures,
        last_failure: failure.to_string(),
      });
    }
    Ok(())
  }

  async fn decode(&self, url: &Url, key: &CacheKey, body: Vec<u8>) -> Result<SearchPage, FetchError> {
    match SearchPage::parse(&body) {
      Ok(page) => Ok(page),
      Err(PageError::Query(messages)) => {
        // Only usable pages stay cached so a re-run asks the server again
        self.cache.invalidate(key).await?;
        error!(url = %url, messages = ?messages, "Query rejected by server");
        Err(FetchError::Query { messages })
      }
      Err(PageError::Malformed(source)) => {
        self.cache.invalidate(key).await?;
        error!(url = %url, error = %source, "Error parsing JSON response");
        Err(FetchError::Decode {
          url: url.to_string(),
          artifact: self.diagnostics_file.clone(),
          body,
          source,
        })
      }
    }
  }

  /// Write the body of the surfaced decode failure to the diagnostics file.
  ///
  /// Runs once per fetch, after the batch has settled, so the file always
  /// holds the body carried by the returned error.
  async fn preserve_body(&self, err: FetchError) -> FetchError {
    let Some(body) = err.raw_body() else {
      return err;
    };
    let artifact = &self.diagnostics_file;

    if let Some(parent) = artifact.parent().filter(|p| !p.as_os_str().is_empty()) {
      if let Err(source) = tokio::fs::create_dir_all(parent).await {
        return FetchError::Artifact {
          path: artifact.clone(),
          source,
        };
      }
    }
    if let Err(source) = tokio::fs::write(artifact, body).await {
      return FetchError::Artifact {
        path: artifact.clone(),
        source,
      };
    }

    error!(artifact = %artifact.display(), "Response body stored for inspection");
    err
  }
}
