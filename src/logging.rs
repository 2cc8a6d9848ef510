use tracing_subscriber::{fmt, EnvFilter};

/// Install the global `tracing` subscriber.
///
/// Level filtering comes from `RUST_LOG` (default `info`). Events are written
/// to stderr so the results document on stdout stays parseable.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
