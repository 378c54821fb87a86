//! Tracing setup for the binary. Logs go to stderr so stdout stays clean
//! for status and report output.

use tracing_subscriber::EnvFilter;

/// Initialize the global subscriber. `RUST_LOG` overrides the default
/// `warn` filter. Call once, before any other work.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
