use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global subscriber. Honours `RUST_LOG`, defaults to `info`.
/// Logs go to stderr so command output on stdout stays machine-readable.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .init();
}
