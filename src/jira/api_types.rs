//! Serde-deserializable types matching Jira API responses.
//!
//! Only the search page envelope is decoded here. Issue records stay opaque
//! `serde_json::Value`s; mapping them to concrete fields is a separate stage.

use serde::Deserialize;
use serde_json::Value;

// ============================================================================
// Search endpoint response
// ============================================================================

/// Envelope exactly as it arrives on the wire. Everything is optional because
/// an error response carries only `errorMessages`.
#[derive(Debug, Deserialize)]
struct ApiSearchResponse {
  #[serde(rename = "startAt", default)]
  start_at: u64,
  #[serde(rename = "maxResults")]
  max_results: Option<u64>,
  total: Option<u64>,
  #[serde(default)]
  issues: Vec<Value>,
  #[serde(rename = "errorMessages", default)]
  error_messages: Option<Vec<String>>,
}

/// Only the error list of a response, used to inspect non-2xx bodies.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
  #[serde(rename = "errorMessages", default)]
  error_messages: Vec<String>,
}

/// One validated page of search results.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchPage {
  pub start_at: u64,
  pub max_results: u64,
  pub total: u64,
  pub issues: Vec<Value>,
}

/// Why a body could not be turned into a [`SearchPage`].
#[derive(Debug)]
pub enum PageError {
  /// The server rejected the query; retrying will not help.
  Query(Vec<String>),
  /// The body is not a search page at all.
  Malformed(serde_json::Error),
}

impl SearchPage {
  /// Decode a response body.
  ///
  /// A non-empty `errorMessages` list wins over everything else; otherwise
  /// `total` and `maxResults` must be present.
  pub fn parse(body: &[u8]) -> Result<Self, PageError> {
    let raw: ApiSearchResponse = serde_json::from_slice(body).map_err(PageError::Malformed)?;

    if let Some(messages) = raw.error_messages.filter(|m| !m.is_empty()) {
      return Err(PageError::Query(messages));
    }

    let total = raw.total.ok_or_else(|| missing_field("total"))?;
    let max_results = raw.max_results.ok_or_else(|| missing_field("maxResults"))?;

    Ok(Self {
      start_at: raw.start_at,
      max_results,
      total,
      issues: raw.issues,
    })
  }
}

/// Query error messages carried by an error body, if it has any.
pub fn error_messages(body: &[u8]) -> Option<Vec<String>> {
  serde_json::from_slice::<ApiErrorResponse>(body)
    .ok()
    .map(|e| e.error_messages)
    .filter(|m| !m.is_empty())
}

fn missing_field(field: &'static str) -> PageError {
  PageError::Malformed(<serde_json::Error as serde::de::Error>::missing_field(field))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_page() {
    let body = br#"{"expand":"names","startAt":0,"maxResults":2,"total":3,
      "issues":[{"key":"ABC-1"},{"key":"ABC-2"}]}"#;
    let page = SearchPage::parse(body).unwrap();
    assert_eq!(page.start_at, 0);
    assert_eq!(page.max_results, 2);
    assert_eq!(page.total, 3);
    assert_eq!(page.issues.len(), 2);
    assert_eq!(page.issues[1]["key"], "ABC-2");
  }

  #[test]
  fn test_error_messages_make_page_an_error() {
    let body = br#"{"errorMessages":["Field 'projekt' does not exist"],"errors":{}}"#;
    match SearchPage::parse(body) {
      Err(PageError::Query(messages)) => {
        assert_eq!(messages, vec!["Field 'projekt' does not exist".to_string()])
      }
      other => panic!("expected query error, got {:?}", other),
    }
  }

  #[test]
  fn test_empty_error_messages_are_ignored() {
    let body = br#"{"startAt":0,"maxResults":50,"total":0,"issues":[],"errorMessages":[]}"#;
    let page = SearchPage::parse(body).unwrap();
    assert!(page.issues.is_empty());
  }

  #[test]
  fn test_missing_total_is_malformed() {
    let body = br#"{"startAt":0,"maxResults":50,"issues":[]}"#;
    match SearchPage::parse(body) {
      Err(PageError::Malformed(e)) => assert!(e.to_string().contains("total")),
      other => panic!("expected malformed, got {:?}", other),
    }
  }

  #[test]
  fn test_html_is_malformed() {
    assert!(matches!(
      SearchPage::parse(b"<!DOCTYPE html><html></html>"),
      Err(PageError::Malformed(_))
    ));
  }

  #[test]
  fn test_error_messages_helper() {
    assert_eq!(
      error_messages(br#"{"errorMessages":["bad jql"]}"#),
      Some(vec!["bad jql".to_string()])
    );
    assert_eq!(error_messages(br#"{"errorMessages":[]}"#), None);
    assert_eq!(error_messages(b"Service Unavailable"), None);
  }
}
