#![deny(unsafe_code)]

//! Configuration loading, defaults, and runtime value types for berth.
//!
//! Loads the optional `config.toml` from the berth configuration directory
//! and validates it. Provides the [`AppConfig`] type as the central
//! configuration structure, the well-known default constants shared by the
//! daemon and the client, and the [`runtime`] value types.

/// Isolation level and network mode value types.
pub mod runtime;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

pub use runtime::{IsolationLevel, NetworkMode};

/// Unix socket the daemon listens on when no host is given.
pub const DEFAULT_UNIX_SOCKET: &str = "/var/run/berth.sock";

/// Default local address used when neither `-H` nor `BERTH_HOST` is given.
pub const DEFAULT_LOCAL_ADDR: &str = "unix:///var/run/berth.sock";

/// Host substituted when a `tcp://` spec omits one.
pub const DEFAULT_TCP_HOST: &str = "127.0.0.1";

/// Port substituted when a `tcp://` spec omits one.
pub const DEFAULT_TCP_PORT: u16 = 2375;

/// Name of the configuration file inside the configuration directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Name of the per-user configuration directory under `$HOME`.
pub const CONFIG_DIR_NAME: &str = ".berth";

/// Default CA certificate file name inside the cert directory.
pub const DEFAULT_CA_FILE: &str = "ca.pem";

/// Default client certificate file name inside the cert directory.
pub const DEFAULT_CERT_FILE: &str = "cert.pem";

/// Default client key file name inside the cert directory.
pub const DEFAULT_KEY_FILE: &str = "key.pem";

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Top-level application configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Daemon configuration.
    #[serde(default)]
    pub daemon: DaemonConfig,

    /// Client configuration.
    #[serde(default)]
    pub client: ClientConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Configuration for the daemon role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Isolation level applied to workloads ("default", "process", "hyperv").
    #[serde(default)]
    pub isolation: IsolationLevel,

    /// Network stack the daemon attaches workloads to.
    #[serde(default = "runtime::default_daemon_network_mode")]
    pub network_mode: NetworkMode,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            isolation: IsolationLevel::default(),
            network_mode: runtime::default_daemon_network_mode(),
        }
    }
}

/// Configuration for the client role.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Exit with status 0 when more than one `-H` is given to the client.
    ///
    /// Older releases did this; the default is to exit with status 1.
    #[serde(default)]
    pub legacy_multi_host_exit: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level used when `--log-level` is not given.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from a TOML file at the given path using async I/O.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse(&content)
    }

    /// Load `config.toml` from `dir`, falling back to defaults when absent.
    pub async fn load_from_dir(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join(CONFIG_FILE_NAME);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        Self::load(&path).await
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.daemon.isolation.is_valid() {
            return Err(ConfigError::Validation(format!(
                "daemon.isolation must be one of \"default\", \"process\" or \"hyperv\", got {:?}",
                self.daemon.isolation.as_str()
            )));
        }
        if self.daemon.network_mode.as_str().is_empty() {
            return Err(ConfigError::Validation(
                "daemon.network_mode must not be empty".to_string(),
            ));
        }
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::Validation(
                "logging.level must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Resolve the configuration directory.
///
/// Precedence: the `--config` flag, then `BERTH_CONFIG`, then `~/.berth`.
/// Falls back to a relative `.berth` when no home directory is known.
pub fn config_dir(flag: Option<&Path>, env_config: Option<&str>) -> PathBuf {
    if let Some(dir) = flag {
        return dir.to_path_buf();
    }
    if let Some(dir) = env_config.filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .map(|home| home.join(CONFIG_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(CONFIG_DIR_NAME))
}

/// Resolve the directory holding the default TLS material.
///
/// `BERTH_CERT_PATH` wins over the configuration directory.
pub fn cert_dir(env_cert_path: Option<&str>, config_dir: &Path) -> PathBuf {
    env_cert_path
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| config_dir.to_path_buf())
}
