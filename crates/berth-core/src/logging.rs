//! Log level parsing, subscriber setup, and the process-wide debug switch.

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::Level;
use tracing_subscriber::EnvFilter;

static DEBUG: AtomicBool = AtomicBool::new(false);

/// An unrecognised `--log-level` value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unable to parse logging level: {0}")]
pub struct LogLevelError(pub String);

/// Parse a log level name.
///
/// Accepts the `tracing` names plus `fatal` and `panic`, which map to
/// [`Level::ERROR`].
pub fn parse_level(name: &str) -> Result<Level, LogLevelError> {
    match name.to_ascii_lowercase().as_str() {
        "fatal" | "panic" => Ok(Level::ERROR),
        other => Level::from_str(other).map_err(|_| LogLevelError(name.to_string())),
    }
}

/// Install the global stderr subscriber at `level`.
///
/// `RUST_LOG` still takes precedence. A second call is a no-op.
pub fn init(level: Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_ascii_lowercase()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Turn on debug mode for the rest of the process.
pub fn enable_debug() {
    DEBUG.store(true, Ordering::Relaxed);
}

pub fn debug_enabled() -> bool {
    DEBUG.load(Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_levels() {
        assert_eq!(parse_level("debug").unwrap(), Level::DEBUG);
        assert_eq!(parse_level("WARN").unwrap(), Level::WARN);
        assert_eq!(parse_level("fatal").unwrap(), Level::ERROR);
    }

    #[test]
    fn test_parse_rejects_unknown_level() {
        let err = parse_level("loud").unwrap_err();
        assert_eq!(err.to_string(), "Unable to parse logging level: loud");
    }

    #[test]
    fn test_debug_switch_latches() {
        enable_debug();
        assert!(debug_enabled());
    }
}
