//! Tracing initialisation helpers for tests.

use tracing_subscriber::EnvFilter;

/// Initialise a subscriber that writes to the test-harness writer and
/// respects `RUST_LOG` (default `debug`).
///
/// Only the first call in a process installs anything.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}
