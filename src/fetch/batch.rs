//! Bounded-concurrency execution of fallible tasks in sequential batches.

use futures::stream::{FuturesUnordered, StreamExt};
use std::future::Future;
use tracing::debug;

/// Runs tasks in fixed-size batches.
///
/// All tasks of a batch are polled concurrently; the next batch starts only
/// once every task of the current one has finished. The first error ends the
/// run: tasks still in flight are dropped and no partial output is returned.
#[derive(Debug, Clone, Copy)]
pub struct BatchRunner {
  batch_size: usize,
}

impl BatchRunner {
  pub fn new(batch_size: usize) -> Self {
    Self {
      batch_size: batch_size.max(1),
    }
  }

  /// Run the tasks and collect their outputs in completion order.
  ///
  /// Futures are pulled from `tasks` lazily, one batch at a time, so nothing
  /// beyond the current batch is created or started early.
  pub async fn run<I, Fut, T, E>(&self, tasks: I) -> Result<Vec<T>, E>
  where
    I: IntoIterator<Item = Fut>,
    Fut: Future<Output = Result<T, E>>,
  {
    let mut tasks = tasks.into_iter().peekable();
    let mut results = Vec::new();
    let mut batch = 0usize;

    while tasks.peek().is_some() {
      batch += 1;
      let mut in_flight: FuturesUnordered<Fut> = tasks.by_ref().take(self.batch_size).collect();
      debug!(batch, size = in_flight.len(), "Starting batch");

      while let Some(result) = in_flight.next().await {
        results.push(result?);
      }
    }

    Ok(results)
  }
}
