//! Writing aggregated search results to disk.

use color_eyre::{eyre::eyre, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Base name of every export file.
pub const OUTPUT_FILE_NAME: &str = "jira-export";

/// Write the issues as a pretty-printed JSON array to `<dir>/jira-export.json`,
/// creating `dir` if needed. Returns the written path.
pub fn write_json(dir: &Path, issues: &[Value]) -> Result<PathBuf> {
  std::fs::create_dir_all(dir)
    .map_err(|e| eyre!("Failed to create output directory {}: {}", dir.display(), e))?;

  let path = dir.join(format!("{}.json", OUTPUT_FILE_NAME));
  let data =
    serde_json::to_vec_pretty(issues).map_err(|e| eyre!("Failed to serialize issues: {}", e))?;

  std::fs::write(&path, data).map_err(|e| eyre!("Failed to write {}: {}", path.display(), e))?;

  Ok(path)
}
