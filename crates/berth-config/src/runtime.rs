//! Isolation level and network mode value types.
//!
//! Both are free-form strings in configuration files; the predicates here
//! give them meaning. Comparisons are case-insensitive where the daemon
//! accepts either spelling.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How workloads started by the daemon are isolated from the host.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IsolationLevel(String);

impl IsolationLevel {
    pub fn new(level: impl Into<String>) -> Self {
        Self(level.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The daemon's default isolation (empty or "default").
    pub fn is_default(&self) -> bool {
        self.0.is_empty() || self.0.eq_ignore_ascii_case("default")
    }

    /// Isolation inside a Hyper-V partition.
    pub fn is_hyperv(&self) -> bool {
        self.0.eq_ignore_ascii_case("hyperv")
    }

    /// Plain process isolation.
    pub fn is_process(&self) -> bool {
        self.0.eq_ignore_ascii_case("process")
    }

    pub fn is_valid(&self) -> bool {
        self.is_default() || self.is_hyperv() || self.is_process()
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The network stack a workload is attached to.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkMode(String);

impl NetworkMode {
    pub fn new(mode: impl Into<String>) -> Self {
        Self(mode.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the default network stack.
    pub fn is_default(&self) -> bool {
        self.0 == "default"
    }

    /// Name of the network stack, or an empty string for user-defined modes.
    pub fn network_name(&self) -> &str {
        if self.is_default() { "default" } else { "" }
    }
}

impl fmt::Display for NetworkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The network stack the daemon uses when none is configured.
pub fn default_daemon_network_mode() -> NetworkMode {
    NetworkMode::new("default")
}

/// Whether `network` is predefined by the daemon.
///
/// This platform predefines none; every named network is user-created.
pub fn is_predefined_network(_network: &str) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isolation_predicates_ignore_case() {
        assert!(IsolationLevel::new("").is_default());
        assert!(IsolationLevel::new("DEFAULT").is_default());
        assert!(IsolationLevel::new("HyperV").is_hyperv());
        assert!(IsolationLevel::new("Process").is_process());
        assert!(!IsolationLevel::new("process").is_hyperv());
    }

    #[test]
    fn test_isolation_validity() {
        for level in ["", "default", "hyperv", "PROCESS"] {
            assert!(IsolationLevel::new(level).is_valid(), "{level} should be valid");
        }
        assert!(!IsolationLevel::new("vm").is_valid());
    }

    #[test]
    fn test_network_mode() {
        let mode = default_daemon_network_mode();
        assert!(mode.is_default());
        assert_eq!(mode.network_name(), "default");

        let custom = NetworkMode::new("backend");
        assert!(!custom.is_default());
        assert_eq!(custom.network_name(), "");
        assert!(!is_predefined_network("backend"));
        assert!(!is_predefined_network("default"));
    }
}
