use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// With `ENVIRONMENT=dev` logs are human-readable at debug level with source
/// locations; otherwise they are JSON lines at info level. `RUST_LOG` overrides
/// the level either way. Keep the returned guard alive until exit so buffered
/// lines are flushed.
pub fn init() -> WorkerGuard {
  let dev = std::env::var("ENVIRONMENT").is_ok_and(|env| env == "dev");
  let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());

  let default_level = if dev { "debug" } else { "info" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

  if dev {
    tracing_subscriber::fmt()
      .with_env_filter(filter)
      .with_writer(writer)
      .with_file(true)
      .with_line_number(true)
      .init();
  } else {
    tracing_subscriber::fmt()
      .json()
      .with_env_filter(filter)
      .with_writer(writer)
      .init();
  }

  guard
}
