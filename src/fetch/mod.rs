//! Resilient fetch layer for paginated search results.
//!
//! A search is fetched as one first page followed by every remaining page,
//! requested in bounded concurrent batches. Each request is served from the
//! response cache when possible and otherwise retried through transport
//! failures and rate limiting until it succeeds or fails terminally.

mod backoff;
mod batch;
mod error;
mod orchestrator;
mod pagination;
mod rate_limit;

pub use error::FetchError;
pub use orchestrator::{AggregatedResult, FetchOrchestrator};
