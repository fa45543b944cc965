//! Detection of rate-limit pages served in place of JSON.
//!
//! When throttling, Jira answers with HTTP 200 and an HTML page instead of the
//! search payload. Only the start of the body is inspected.

/// Bytes of the body that are looked at.
const PREFIX_LEN: usize = 100;

/// Lowercase markers that open an HTML document.
const HTML_MARKERS: [&[u8]; 2] = [b"<!doctype html", b"<html"];

/// Whether a 2xx body is a rate-limit page rather than the expected JSON.
///
/// Leading whitespace is skipped and the marker match is case-insensitive.
pub fn is_rate_limit_page(body: &[u8]) -> bool {
  let prefix = &body[..body.len().min(PREFIX_LEN)];
  let start = prefix
    .iter()
    .position(|b| !b.is_ascii_whitespace())
    .unwrap_or(prefix.len());
  let head = &prefix[start..];

  HTML_MARKERS
    .iter()
    .any(|marker| head.len() >= marker.len() && head[..marker.len()].eq_ignore_ascii_case(marker))
}
