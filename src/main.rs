mod cache;
mod config;
mod export;
mod fetch;
mod jira;
mod logging;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use tracing::{debug, error, info};

#[derive(Parser, Debug)]
#[command(name = "jira-export")]
#[command(about = "Export Jira issues to JSON")]
#[command(version)]
struct Args {
  /// Path to config file (default: ./jira-export.yaml or $XDG_CONFIG_HOME/jira-export/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Jira username
  #[arg(short, long, env = "JIRA_EXPORT_USERNAME")]
  username: Option<String>,

  /// Jira API token
  #[arg(short, long, env = "JIRA_EXPORT_TOKEN", hide_env_values = true)]
  token: Option<String>,

  /// Jira URL
  #[arg(short = 'r', long, env = "JIRA_EXPORT_URL")]
  url: Option<String>,

  /// JQL query
  #[arg(short, long, env = "JIRA_EXPORT_JQL")]
  jql: Option<String>,

  /// Output directory (default: dist/jira/results)
  #[arg(short, long)]
  output: Option<PathBuf>,

  /// Max results requested for the first page (default: 100)
  #[arg(short, long)]
  max_results: Option<u64>,

  /// Response cache directory (default: cache)
  #[arg(long)]
  cache_dir: Option<PathBuf>,

  /// JSON file with username, token and url
  #[arg(long)]
  secrets: Option<PathBuf>,

  /// Give up on a request after this many retries (default: retry forever)
  #[arg(long)]
  max_attempts: Option<u32>,
}

impl Args {
  fn overrides(&self) -> config::Overrides {
    config::Overrides {
      username: self.username.clone(),
      token: self.token.clone(),
      url: self.url.clone(),
      jql: self.jql.clone(),
      secrets_file: self.secrets.clone(),
      output_dir: self.output.clone(),
      cache_dir: self.cache_dir.clone(),
      max_results: self.max_results,
      max_attempts: self.max_attempts,
    }
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  // Load .env before parsing so its values reach the env-bound flags
  let dotenv = dotenvy::dotenv();
  let args = Args::parse();
  let _log_guard = logging::init();

  if let Err(e) = dotenv {
    debug!(error = %e, "No .env file loaded");
  }
  info!("Starting Jira Export");

  let overrides = args.overrides();
  let mut config = config::Config::load(args.config.as_deref())?;
  config.apply(&overrides)?;
  let secrets = config.secrets(&overrides)?;
  let jql = config.jql(&overrides)?;

  let client = jira::JiraClient::new(&config, &secrets)?;
  debug!(jql = %jql, "Exporting Jira issues");

  let result = match client.search_issues(&jql).await {
    Ok(result) => result,
    Err(e) => {
      error!(error = %e.root(), stage = %e.stage(), "Export failed");
      if let Some(body) = e.raw_body() {
        error!(bytes = body.len(), "Undecodable response body was preserved");
      }
      return Err(e.into());
    }
  };

  let path = export::write_json(&config.output.dir, &result.issues)?;
  info!(
    count = result.issues.len(),
    total = result.total,
    pages = result.pages,
    path = %path.display(),
    "Exported Jira issues"
  );

  Ok(())
}
