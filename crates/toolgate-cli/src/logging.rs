//! Logging setup for the binary.

use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

/// Install the global subscriber, writing to stderr.
///
/// `RUST_LOG` wins when set; otherwise the level is `info`, or `debug` with
/// `--verbose`.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // A second init (e.g. in tests) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Load `.env` from the working directory or its parents, if present.
///
/// Runs before logging is set up so `.env` can carry `RUST_LOG`; the loaded
/// path is returned for the caller to log.
pub fn load_dotenv() -> Option<PathBuf> {
    dotenvy::dotenv().ok()
}
