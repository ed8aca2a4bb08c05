//! Log subscriber setup shared by the binaries.

use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber on stderr. `RUST_LOG` wins over `level`;
/// `verbose` raises `level` to debug.
pub fn init(level: &str, verbose: bool) {
    let level = if verbose { "debug" } else { level };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
