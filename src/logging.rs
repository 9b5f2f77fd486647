use std::path::{
    Path,
    PathBuf,
};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::{
    EnvFilter,
    fmt,
};

/// `~/.danger-tiles/logs`
pub fn default_log_dir() -> PathBuf {
    PathBuf::from(shellexpand::tilde("~/.danger-tiles/logs").into_owned())
}

fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Logs to stderr. `RUST_LOG` wins over `filter` when set.
pub fn init_tracing(filter: &str) {
    let _ = fmt()
        .with_env_filter(env_filter(filter))
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Logs to a daily rolling file `<dir>/<prefix>.<date>` so output does not
/// interleave with anything drawn on the terminal. Keep the returned guard
/// alive for as long as logs should be flushed.
pub fn init_file_tracing(dir: &Path, prefix: &str, filter: &str) -> WorkerGuard {
    let appender = rolling::daily(dir, prefix);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = fmt()
        .with_env_filter(env_filter(filter))
        .with_ansi(false)
        .with_writer(writer)
        .try_init();
    guard
}
