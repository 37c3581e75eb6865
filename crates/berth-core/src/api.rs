//! Request/response bodies for the daemon control API.
//!
//! Serialized as JSON over HTTP/1.1 on every transport the daemon listens
//! on.

use serde::{Deserialize, Serialize};

/// Body of `GET /_ping`.
pub const PING_OK: &str = "OK";

/// `GET /version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionResponse {
    pub version: String,
    pub git_commit: String,
    pub build_profile: String,
    pub experimental: bool,
    pub os: String,
    pub arch: String,
}

impl VersionResponse {
    /// Version information for this binary.
    pub fn current() -> Self {
        Self {
            version: crate::build_info::VERSION.to_string(),
            git_commit: crate::build_info::GIT_HASH.to_string(),
            build_profile: crate::build_info::BUILD_PROFILE.to_string(),
            experimental: crate::build_info::experimental_build(),
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        }
    }
}

/// `GET /info`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfoResponse {
    pub pid: u32,
    pub uptime_secs: u64,
    pub listeners: Vec<String>,
    pub isolation: String,
    pub network_mode: String,
    pub network_predefined: bool,
    pub debug: bool,
    pub log_level: String,
}

/// Error body for any non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
}
