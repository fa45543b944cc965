//! Planning of follow-up page requests.

/// One follow-up page to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
  pub start_at: u64,
  pub page_size: u64,
}

/// Follow-up pages covering `[start_at, total)` in strides of `page_size`.
///
/// Strides are contiguous and non-overlapping and every `start_at` is below
/// `total`. The plan is empty when the first page already covered everything.
pub fn plan(start_at: u64, total: u64, page_size: u64) -> Vec<PageRequest> {
  if page_size == 0 || total <= start_at {
    return Vec::new();
  }

  let stride = usize::try_from(page_size).unwrap_or(usize::MAX);
  (start_at..total)
    .step_by(stride)
    .map(|start_at| PageRequest {
      start_at,
      page_size,
    })
    .collect()
}
