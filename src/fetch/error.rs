//! Error types for the fetch layer.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Terminal failure of a fetch.
///
/// Transient conditions (connection errors, non-2xx statuses, rate-limit pages)
/// are retried inside the fetch loop and only show up here as
/// [`FetchError::RetriesExhausted`] when a retry ceiling is configured.
#[derive(Debug, Error)]
pub enum FetchError {
  /// The server answered 401; credentials are never retried
  #[error("authentication failed: received 401 Unauthorized from {url}")]
  Authentication { url: String },

  /// The query itself was rejected (`errorMessages` in the response)
  #[error("error in response: {}", .messages.join("; "))]
  Query { messages: Vec<String> },

  /// The body could not be decoded; it has been written to `artifact`
  #[error("error decoding JSON from {url}: {source}. Response body stored in {}", .artifact.display())]
  Decode {
    url: String,
    artifact: PathBuf,
    body: Vec<u8>,
    #[source]
    source: serde_json::Error,
  },

  /// A configured retry ceiling was hit
  #[error("giving up on {url} after {attempts} failed attempts: {last_failure}")]
  RetriesExhausted {
    url: String,
    attempts: u32,
    last_failure: String,
  },

  /// A follow-up page failed, which fails the whole fetch
  #[error("follow-up page at startAt={start_at} failed: {source}")]
  Batch {
    start_at: u64,
    #[source]
    source: Box<FetchError>,
  },

  /// The cache directory could not be read or written
  #[error("cache error: {0}")]
  Cache(#[from] std::io::Error),

  /// The diagnostic copy of an undecodable body could not be written
  #[error("error writing response body to {}: {source}", .path.display())]
  Artifact {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

/// Which part of the fetch failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStage {
  FirstPage,
  FollowUp { start_at: u64 },
}

impl fmt::Display for FetchStage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      FetchStage::FirstPage => write!(f, "first page"),
      FetchStage::FollowUp { start_at } => write!(f, "follow-up page at {}", start_at),
    }
  }
}

impl FetchError {
  pub fn stage(&self) -> FetchStage {
    match self {
      FetchError::Batch { start_at, .. } => FetchStage::FollowUp {
        start_at: *start_at,
      },
      _ => FetchStage::FirstPage,
    }
  }

  /// The underlying error, looking through batch wrappers.
  pub fn root(&self) -> &FetchError {
    match self {
      FetchError::Batch { source, .. } => source.root(),
      other => other,
    }
  }

  /// Raw body of an undecodable response.
  pub fn raw_body(&self) -> Option<&[u8]> {
    match self.root() {
      FetchError::Decode { body, .. } => Some(body.as_slice()),
      _ => None,
    }
  }
}
