use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub jira: JiraConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub fetch: FetchConfig,
  #[serde(default)]
  pub retry: RetryConfig,
  #[serde(default)]
  pub output: OutputConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JiraConfig {
  /// Base URL, e.g. "https://example.atlassian.net"
  pub url: Option<String>,
  /// Account email used for Basic auth
  pub username: Option<String>,
  /// Default JQL query
  pub jql: Option<String>,
  /// JSON file holding username, token and url
  pub secrets_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  #[serde(default = "default_cache_dir")]
  pub dir: PathBuf,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      dir: default_cache_dir(),
    }
  }
}

fn default_cache_dir() -> PathBuf {
  PathBuf::from("cache")
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
  /// `maxResults` requested for the first page
  #[serde(default = "default_page_size")]
  pub max_results: u64,
  /// Page size of follow-up requests, independent of what the first page reports
  #[serde(default = "default_page_size")]
  pub page_size: u64,
  /// Follow-up requests in flight at once
  #[serde(default = "default_batch_size")]
  pub batch_size: usize,
}

impl Default for FetchConfig {
  fn default() -> Self {
    Self {
      max_results: default_page_size(),
      page_size: default_page_size(),
      batch_size: default_batch_size(),
    }
  }
}

fn default_page_size() -> u64 {
  100
}

fn default_batch_size() -> usize {
  10
}

/// Retry timing for a single request's loop.
///
/// Leaving both `max_attempts` and `max_elapsed_secs` unset retries transient
/// failures forever; either one turns the loop into a bounded one.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
  #[serde(default = "default_base_delay_ms")]
  pub base_delay_ms: u64,
  #[serde(default = "default_max_delay_ms")]
  pub max_delay_ms: u64,
  #[serde(default = "default_jitter_min_ms")]
  pub rate_limit_jitter_min_ms: u64,
  #[serde(default = "default_jitter_max_ms")]
  pub rate_limit_jitter_max_ms: u64,
  /// Retries allowed per request before giving up
  #[serde(default)]
  pub max_attempts: Option<u32>,
  /// Wall time allowed per request before giving up
  #[serde(default)]
  pub max_elapsed_secs: Option<u64>,
}

impl Default for RetryConfig {
  fn default() -> Self {
    Self {
      base_delay_ms: default_base_delay_ms(),
      max_delay_ms: default_max_delay_ms(),
      rate_limit_jitter_min_ms: default_jitter_min_ms(),
      rate_limit_jitter_max_ms: default_jitter_max_ms(),
      max_attempts: None,
      max_elapsed_secs: None,
    }
  }
}

impl RetryConfig {
  pub fn base_delay(&self) -> Duration {
    Duration::from_millis(self.base_delay_ms)
  }

  pub fn max_delay(&self) -> Duration {
    Duration::from_millis(self.max_delay_ms)
  }

  pub fn max_elapsed(&self) -> Option<Duration> {
    self.max_elapsed_secs.map(Duration::from_secs)
  }
}

fn default_base_delay_ms() -> u64 {
  1_000
}

fn default_max_delay_ms() -> u64 {
  60_000
}

fn default_jitter_min_ms() -> u64 {
  500
}

fn default_jitter_max_ms() -> u64 {
  1_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
  #[serde(default = "default_output_dir")]
  pub dir: PathBuf,
  /// Where the raw body of an undecodable response is written
  #[serde(default = "default_diagnostics_file")]
  pub diagnostics_file: PathBuf,
}

impl Default for OutputConfig {
  fn default() -> Self {
    Self {
      dir: default_output_dir(),
      diagnostics_file: default_diagnostics_file(),
    }
  }
}

fn default_output_dir() -> PathBuf {
  PathBuf::from("dist/jira/results")
}

fn default_diagnostics_file() -> PathBuf {
  PathBuf::from("error.txt")
}

/// Credentials and endpoint for one Jira instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Secrets {
  #[serde(default)]
  pub username: String,
  #[serde(default)]
  pub token: String,
  #[serde(default)]
  pub url: String,
}

impl Secrets {
  /// Read secrets from a JSON file of the form
  /// `{"username": "...", "token": "...", "url": "..."}`.
  pub fn from_file(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read secrets file {}: {}", path.display(), e))?;

    serde_json::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse secrets file {}: {}", path.display(), e))
  }
}

/// Values given on the command line (or through their environment variables).
#[derive(Debug, Clone, Default)]
pub struct Overrides {
  pub username: Option<String>,
  pub token: Option<String>,
  pub url: Option<String>,
  pub jql: Option<String>,
  pub secrets_file: Option<PathBuf>,
  pub output_dir: Option<PathBuf>,
  pub cache_dir: Option<PathBuf>,
  pub max_results: Option<u64>,
  pub max_attempts: Option<u32>,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./jira-export.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/jira-export/config.yaml
  ///
  /// Unlike an explicit path, a missing file in the search locations is not an
  /// error: everything can be supplied by flags and environment variables.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("jira-export.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("jira-export").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn from_yaml(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    config.validate()?;
    Ok(config)
  }

  fn validate(&self) -> Result<()> {
    if self.fetch.page_size == 0 {
      return Err(eyre!("fetch.page_size must be greater than zero"));
    }
    if self.fetch.max_results == 0 {
      return Err(eyre!("fetch.max_results must be greater than zero"));
    }
    if self.fetch.batch_size == 0 {
      return Err(eyre!("fetch.batch_size must be greater than zero"));
    }
    if self.retry.base_delay_ms == 0 {
      return Err(eyre!("retry.base_delay_ms must be greater than zero"));
    }
    if self.retry.max_delay_ms == 0 {
      return Err(eyre!("retry.max_delay_ms must be greater than zero"));
    }
    if self.retry.max_delay_ms < self.retry.base_delay_ms {
      return Err(eyre!("retry.max_delay_ms must not be below retry.base_delay_ms"));
    }
    if self.retry.rate_limit_jitter_min_ms >= self.retry.rate_limit_jitter_max_ms {
      return Err(eyre!(
        "retry.rate_limit_jitter_min_ms must be below retry.rate_limit_jitter_max_ms"
      ));
    }
    Ok(())
  }

  /// Apply command line overrides to the non-secret settings.
  pub fn apply(&mut self, overrides: &Overrides) -> Result<()> {
    if let Some(dir) = &overrides.output_dir {
      self.output.dir = dir.clone();
    }
    if let Some(dir) = &overrides.cache_dir {
      self.cache.dir = dir.clone();
    }
    if let Some(max_results) = overrides.max_results {
      self.fetch.max_results = max_results;
    }
    if let Some(max_attempts) = overrides.max_attempts {
      self.retry.max_attempts = Some(max_attempts);
    }
    if let Some(file) = &overrides.secrets_file {
      self.jira.secrets_file = Some(file.clone());
    }
    self.validate()
  }

  /// Resolve credentials and endpoint.
  ///
  /// Precedence, highest first: command line / environment, secrets file,
  /// config file, then `JIRA_API_TOKEN` for the token.
  pub fn secrets(&self, overrides: &Overrides) -> Result<Secrets> {
    let from_file = match &self.jira.secrets_file {
      Some(path) => Secrets::from_file(path)?,
      None => Secrets::default(),
    };

    let pick = |cli: &Option<String>, file: &str, config: &Option<String>| {
      cli
        .as_deref()
        .and_then(non_empty)
        .or_else(|| non_empty(file))
        .or_else(|| config.as_deref().and_then(non_empty))
    };

    let username = pick(&overrides.username, &from_file.username, &self.jira.username)
      .ok_or_else(|| eyre!("Missing username. Pass --username or set JIRA_EXPORT_USERNAME."))?;
    let url = pick(&overrides.url, &from_file.url, &self.jira.url)
      .ok_or_else(|| eyre!("Missing URL. Pass --url or set JIRA_EXPORT_URL."))?;
    let token = match pick(&overrides.token, &from_file.token, &None) {
      Some(token) => token,
      None => Self::get_api_token()?,
    };

    Ok(Secrets {
      username,
      token,
      url: url.trim_end_matches('/').to_string(),
    })
  }

  /// Resolve the JQL query, trimming surrounding single quotes.
  pub fn jql(&self, overrides: &Overrides) -> Result<String> {
    let jql = overrides
      .jql
      .as_deref()
      .or(self.jira.jql.as_deref())
      .map(|j| j.trim().trim_matches('\''))
      .filter(|j| !j.is_empty())
      .ok_or_else(|| eyre!("Missing JQL query. Pass --jql or set JIRA_EXPORT_JQL."))?;
    Ok(jql.to_string())
  }

  /// Get the Jira API token from environment variables.
  ///
  /// Checks JIRA_EXPORT_TOKEN first, then JIRA_API_TOKEN as fallback.
  pub fn get_api_token() -> Result<String> {
    std::env::var("JIRA_EXPORT_TOKEN")
      .or_else(|_| std::env::var("JIRA_API_TOKEN"))
      .map_err(|_| {
        eyre!("Missing token. Pass --token or set JIRA_EXPORT_TOKEN or JIRA_API_TOKEN.")
      })
  }
}

fn non_empty(s: &str) -> Option<String> {
  (!s.is_empty()).then(|| s.to_string())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults() {
    let config = Config::from_yaml("{}").unwrap();
    assert_eq!(config.cache.dir, PathBuf::from("cache"));
    assert_eq!(config.fetch.max_results, 100);
    assert_eq!(config.fetch.page_size, 100);
    assert_eq!(config.fetch.batch_size, 10);
    assert_eq!(config.retry.base_delay(), Duration::from_secs(1));
    assert_eq!(config.retry.max_delay(), Duration::from_secs(60));
    assert_eq!(config.retry.max_attempts, None);
    assert_eq!(config.retry.max_elapsed(), None);
    assert_eq!(config.output.dir, PathBuf::from("dist/jira/results"));
    assert_eq!(config.output.diagnostics_file, PathBuf::from("error.txt"));
  }

  #[test]
  fn test_parse_sections() {
    let yaml = r#"
jira:
  url: https://example.atlassian.net
  username: me@example.com
cache:
  dir: /tmp/jira-cache
fetch:
  batch_size: 4
retry:
  base_delay_ms: 250
  max_attempts: 7
  max_elapsed_secs: 600
"#;
    let config = Config::from_yaml(yaml).unwrap();
    assert_eq!(config.jira.url.as_deref(), Some("https://example.atlassian.net"));
    assert_eq!(config.cache.dir, PathBuf::from("/tmp/jira-cache"));
    assert_eq!(config.fetch.batch_size, 4);
    assert_eq!(config.fetch.page_size, 100);
    assert_eq!(config.retry.base_delay(), Duration::from_millis(250));
    assert_eq!(config.retry.max_attempts, Some(7));
    assert_eq!(config.retry.max_elapsed(), Some(Duration::from_secs(600)));
  }

  #[test]
  fn test_rejects_zero_batch_size() {
    assert!(Config::from_yaml("fetch:\n  batch_size: 0\n").is_err());
  }

  #[test]
  fn test_rejects_zero_base_delay() {
    let err = Config::from_yaml("retry:\n  base_delay_ms: 0\n").unwrap_err();
    assert!(err.to_string().contains("base_delay_ms"));
  }

  #[test]
  fn test_rejects_zero_max_delay() {
    let err = Config::from_yaml("retry:\n  base_delay_ms: 0\n  max_delay_ms: 0\n").unwrap_err();
    assert!(err.to_string().contains("greater than zero"));
    let err = Config::from_yaml("retry:\n  max_delay_ms: 0\n").unwrap_err();
    assert!(err.to_string().contains("max_delay_ms"));
  }

  #[test]
  fn test_rejects_max_delay_below_base() {
    let yaml = "retry:\n  base_delay_ms: 2000\n  max_delay_ms: 1000\n";
    let err = Config::from_yaml(yaml).unwrap_err();
    assert!(err.to_string().contains("must not be below"));
    assert!(Config::from_yaml("retry:\n  base_delay_ms: 1000\n  max_delay_ms: 1000\n").is_ok());
  }

  #[test]
  fn test_explicit_missing_path_is_error() {
    let tmp = tempfile::tempdir().unwrap();
    assert!(Config::load(Some(&tmp.path().join("nope.yaml"))).is_err());
  }

  #[test]
  fn test_secrets_from_file() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("secrets.json");
    std::fs::write(
      &path,
      r#"{"username": "testuser", "token": "testtoken", "url": "https://testurl.atlassian.net"}"#,
    )
    .unwrap();

    let secrets = Secrets::from_file(&path).unwrap();
    assert_eq!(secrets.username, "testuser");
    assert_eq!(secrets.token, "testtoken");
    assert_eq!(secrets.url, "https://testurl.atlassian.net");
  }

  #[test]
  fn test_cli_overrides_secrets_file() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("secrets.json");
    std::fs::write(
      &path,
      r#"{"username": "file-user", "token": "file-token", "url": "https://file.atlassian.net/"}"#,
    )
    .unwrap();

    let mut config = Config::default();
    config.jira.username = Some("config-user".to_string());
    let overrides = Overrides {
      username: Some("cli-user".to_string()),
      secrets_file: Some(path),
      ..Default::default()
    };
    config.apply(&overrides).unwrap();

    let secrets = config.secrets(&overrides).unwrap();
    assert_eq!(secrets.username, "cli-user");
    assert_eq!(secrets.token, "file-token");
    assert_eq!(secrets.url, "https://file.atlassian.net");
  }

  #[test]
  fn test_apply_overrides() {
    let mut config = Config::default();
    let overrides = Overrides {
      output_dir: Some(PathBuf::from("out")),
      cache_dir: Some(PathBuf::from("c")),
      max_results: Some(50),
      max_attempts: Some(3),
      ..Default::default()
    };
    config.apply(&overrides).unwrap();
    assert_eq!(config.output.dir, PathBuf::from("out"));
    assert_eq!(config.cache.dir, PathBuf::from("c"));
    assert_eq!(config.fetch.max_results, 50);
    assert_eq!(config.retry.max_attempts, Some(3));
  }

  #[test]
  fn test_jql_trims_single_quotes() {
    let config = Config::default();
    let overrides = Overrides {
      jql: Some("'project = ABC ORDER BY created'".to_string()),
      ..Default::default()
    };
    assert_eq!(config.jql(&overrides).unwrap(), "project = ABC ORDER BY created");
  }

  #[test]
  fn test_missing_jql_is_error() {
    let config = Config::default();
    let overrides = Overrides {
      jql: Some("''".to_string()),
      ..Default::default()
    };
    assert!(config.jql(&overrides).is_err());
  }
}
