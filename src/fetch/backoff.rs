//! Retry delay policies.
//!
//! Network failures and rate-limit pages use separate sequences. Both live
//! inside a single request's retry loop, so a request that keeps getting
//! throttled never slows down its siblings.

use rand::Rng;
use std::ops::Range;
use std::time::Duration;

use crate::config::RetryConfig;

/// Doubling delay for transport errors and non-2xx responses, capped at `max`.
#[derive(Debug, Clone)]
pub struct NetworkBackoff {
  base: Duration,
  max: Duration,
  current: Duration,
}

impl NetworkBackoff {
  pub fn new(base: Duration, max: Duration) -> Self {
    Self {
      base,
      max,
      current: base.min(max),
    }
  }

  pub fn from_config(config: &RetryConfig) -> Self {
    Self::new(config.base_delay(), config.max_delay())
  }

  /// Delay to sleep after the current failure. Advances the sequence.
  pub fn next_delay(&mut self) -> Duration {
    let delay = self.current;
    self.current = self.current.saturating_mul(2).min(self.max);
    delay
  }

  /// Back to the base delay after a success.
  pub fn reset(&mut self) {
    self.current = self.base.min(self.max);
  }
}

/// Jittered multiplicative delay for rate-limit pages.
///
/// Each delay is a uniform draw from the jitter range (milliseconds) scaled by
/// a factor that starts at 1.0 and doubles after every rate-limit event.
#[derive(Debug, Clone)]
pub struct RateLimitBackoff {
  factor: f64,
  jitter_ms: Range<u64>,
}

impl RateLimitBackoff {
  pub fn new(jitter_ms: Range<u64>) -> Self {
    Self {
      factor: 1.0,
      jitter_ms,
    }
  }

  pub fn from_config(config: &RetryConfig) -> Self {
    Self::new(config.rate_limit_jitter_min_ms..config.rate_limit_jitter_max_ms)
  }

  #[cfg(test)]
  pub fn factor(&self) -> f64 {
    self.factor
  }

  /// Delay to sleep after the current rate-limit event. Doubles the factor.
  pub fn next_delay(&mut self) -> Duration {
    let jitter = if self.jitter_ms.is_empty() {
      self.jitter_ms.start
    } else {
      rand::thread_rng().gen_range(self.jitter_ms.clone())
    };
    let delay =
      Duration::try_from_secs_f64(jitter as f64 * self.factor / 1000.0).unwrap_or(Duration::MAX);
    self.factor *= 2.0;
    delay
  }
}
