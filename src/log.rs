use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Stdout carries the LSP wire protocol, so all logging goes to stderr.
pub fn init(default_level: &str) {
    // Use RUST_LOG if set, otherwise default to the configured level
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .init();
}
