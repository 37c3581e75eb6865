//! Startup sequence.
//!
//! Runs once per process: version short-circuit, configuration and log
//! level, host resolution, TLS (client role only), then dispatch. Every
//! failure comes back as a [`CommandError`]; nothing here exits.

use std::path::PathBuf;

use berth_config::AppConfig;
use tracing::{Level, debug};

use crate::build_info;
use crate::dispatch::{self, Dispatcher, ProcessRole, Role};
use crate::endpoint::{self, HostError, MultiHostPolicy};
use crate::logging;
use crate::outcome::{CommandError, CommandOutcome};
use crate::tls::{self, TlsRequest, TrustOptions};

/// Environment variable naming the default host.
pub const ENV_HOST: &str = "BERTH_HOST";
/// Environment variable that turns on `--tlsverify` when non-empty.
pub const ENV_TLS_VERIFY: &str = "BERTH_TLS_VERIFY";
/// Environment variable that turns on debug mode when non-empty.
pub const ENV_DEBUG: &str = "BERTH_DEBUG";
/// Environment variable overriding the TLS material directory.
pub const ENV_CERT_PATH: &str = "BERTH_CERT_PATH";
/// Environment variable overriding the configuration directory.
pub const ENV_CONFIG: &str = "BERTH_CONFIG";

/// Parsed command line, independent of the argument parser.
#[derive(Debug, Clone, Default)]
pub struct StartupOptions {
    pub hosts: Vec<String>,
    pub daemon: bool,
    pub tls: bool,
    pub tls_verify: Option<bool>,
    pub tls_cert: Option<PathBuf>,
    pub tls_key: Option<PathBuf>,
    pub tls_ca: Option<PathBuf>,
    pub config_dir: Option<PathBuf>,
    pub log_level: Option<String>,
    pub debug: bool,
    pub version: bool,
    pub help: bool,
    /// Rendered usage text, printed for `-h`.
    pub usage: String,
    /// The command and its arguments.
    pub args: Vec<String>,
}

/// Snapshot of the environment variables startup consults.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    pub host: Option<String>,
    pub tls_verify: Option<String>,
    pub debug: Option<String>,
    pub cert_path: Option<String>,
    pub config: Option<String>,
}

impl Environment {
    /// Read the variables from the current process.
    pub fn from_process() -> Self {
        let var = |name: &str| std::env::var(name).ok();
        Self {
            host: var(ENV_HOST),
            tls_verify: var(ENV_TLS_VERIFY),
            debug: var(ENV_DEBUG),
            cert_path: var(ENV_CERT_PATH),
            config: var(ENV_CONFIG),
        }
    }

    pub fn tls_verify_set(&self) -> bool {
        self.tls_verify.as_deref().is_some_and(|v| !v.is_empty())
    }

    pub fn debug_set(&self) -> bool {
        self.debug.as_deref().is_some_and(|v| !v.is_empty())
    }
}

/// Run startup and the selected role to completion.
pub async fn run(
    options: &StartupOptions,
    env: &Environment,
    dispatcher: &Dispatcher<'_>,
) -> CommandOutcome {
    if options.version {
        println!("{}", build_info::version_banner());
        return Ok(());
    }

    let config_dir = berth_config::config_dir(options.config_dir.as_deref(), env.config.as_deref());
    let mut config = AppConfig::load_from_dir(&config_dir)
        .await
        .map_err(CommandError::generic)?;

    let level = log_level(options, env, &config)?;
    logging::init(level);
    // Collaborators see the level in effect, not the one in the file.
    config.logging.level = level.as_str().to_ascii_lowercase();
    debug!(config_dir = %config_dir.display(), %level, "Configuration loaded");

    let kind = ProcessRole::from_flag(options.daemon);
    if dispatch::usage_only(options.help, kind, &options.args) {
        return dispatcher.usage(kind, &options.usage);
    }

    let role = match kind {
        ProcessRole::Daemon => {
            let listeners = endpoint::resolve_hosts(&options.hosts, env.host.as_deref(), true)
                .map_err(CommandError::generic)?;
            Role::Daemon { config, listeners }
        }
        ProcessRole::Client => {
            let policy = MultiHostPolicy::from_legacy_flag(config.client.legacy_multi_host_exit);
            let endpoint = endpoint::resolve(&options.hosts, env.host.as_deref(), false)
                .map_err(|e| host_error(e, policy))?;

            let request = TlsRequest {
                tls: options.tls,
                tls_verify_flag: options.tls_verify,
                env_tls_verify: env.tls_verify_set(),
                cert_explicit: options.tls_cert.is_some(),
                key_explicit: options.tls_key.is_some(),
            };
            let cert_dir = berth_config::cert_dir(env.cert_path.as_deref(), &config_dir);
            let trust_options = TrustOptions::with_default_paths(
                &cert_dir,
                options.tls_cert.clone(),
                options.tls_key.clone(),
                options.tls_ca.clone(),
            );
            let trust = tls::build(&request, trust_options).map_err(CommandError::generic)?;

            Role::Client {
                endpoint,
                trust,
                args: options.args.clone(),
            }
        }
    };

    dispatcher.dispatch(options.help, &options.usage, role).await
}

/// `-D`/`BERTH_DEBUG` win over `--log-level`, which wins over the config file.
fn log_level(
    options: &StartupOptions,
    env: &Environment,
    config: &AppConfig,
) -> Result<Level, CommandError> {
    let configured = options
        .log_level
        .as_deref()
        .unwrap_or(&config.logging.level);
    let level = logging::parse_level(configured).map_err(CommandError::generic)?;

    if options.debug || env.debug_set() {
        logging::enable_debug();
        return Ok(Level::DEBUG);
    }
    Ok(level)
}

fn host_error(err: HostError, policy: MultiHostPolicy) -> CommandError {
    match err {
        HostError::TooManyHosts(_) => CommandError::Usage {
            message: err.to_string(),
            exit_code: policy.exit_code(),
        },
        other => CommandError::generic(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_toggles_require_non_empty_values() {
        let env = Environment {
            tls_verify: Some(String::new()),
            debug: Some("1".to_string()),
            ..Default::default()
        };
        assert!(!env.tls_verify_set());
        assert!(env.debug_set());
    }

    #[test]
    fn test_too_many_hosts_follows_policy() {
        let err = host_error(HostError::TooManyHosts(2), MultiHostPolicy::LegacyExitZero);
        assert_eq!(
            err,
            CommandError::Usage {
                message: "Please specify only one -H".to_string(),
                exit_code: 0,
            }
        );
    }

    #[test]
    fn test_invalid_log_level_is_fatal() {
        let options = StartupOptions {
            log_level: Some("loud".to_string()),
            ..Default::default()
        };
        let err = log_level(&options, &Environment::default(), &AppConfig::default()).unwrap_err();
        assert_eq!(
            err,
            CommandError::Generic("Unable to parse logging level: loud".to_string())
        );
    }

    #[test]
    fn test_config_level_used_without_flag() {
        let mut config = AppConfig::default();
        config.logging.level = "warn".to_string();
        let level = log_level(&StartupOptions::default(), &Environment::default(), &config).unwrap();
        assert_eq!(level, Level::WARN);
    }
}
