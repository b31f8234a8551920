//! Tracing subscriber setup.
//!
//! Operator prompts and reports are written to the console; everything
//! diagnostic goes through `tracing`:
//! - ERROR: socket receive failures
//! - WARN: send failures, rejected console input
//! - INFO: session transitions, LED changes, reports
//! - DEBUG: individual datagrams and timer ticks

use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber; `RUST_LOG` overrides the `info` default.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Initialize the tracing subscriber for tests; safe to call repeatedly.
pub fn init_for_tests() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
