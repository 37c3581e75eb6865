//! Startup option builders for tests.
//!
//! Use [`TestStartup`] to assemble [`StartupOptions`] and an
//! [`Environment`] rooted in a private temp directory, so tests never read
//! the real `~/.berth`.

use std::path::{Path, PathBuf};

use berth_core::{Environment, StartupOptions};
use tempfile::TempDir;

/// Fluent builder for startup inputs.
///
/// # Example
///
/// ```ignore
/// let startup = TestStartup::new()
///     .host("tcp://127.0.0.1:2375")
///     .tls_verify(false)
///     .args(&["ping"]);
/// let outcome = bootstrap::run(startup.options(), startup.env(), &dispatcher).await;
/// ```
pub struct TestStartup {
    options: StartupOptions,
    env: Environment,
    dir: TempDir,
}

impl TestStartup {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let options = StartupOptions {
            config_dir: Some(dir.path().to_path_buf()),
            usage: "Usage: berth [OPTIONS] COMMAND\n".to_string(),
            ..Default::default()
        };
        Self {
            options,
            env: Environment::default(),
            dir,
        }
    }

    /// The temp directory used as configuration and cert directory.
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Write `config.toml` into the temp directory.
    pub fn config_toml(self, toml: &str) -> Self {
        std::fs::write(self.dir.path().join(berth_config::CONFIG_FILE_NAME), toml)
            .expect("failed to write test config");
        self
    }

    pub fn host(mut self, spec: &str) -> Self {
        self.options.hosts.push(spec.to_string());
        self
    }

    pub fn daemon(mut self) -> Self {
        self.options.daemon = true;
        self
    }

    pub fn help(mut self) -> Self {
        self.options.help = true;
        self
    }

    pub fn version(mut self) -> Self {
        self.options.version = true;
        self
    }

    pub fn tls(mut self) -> Self {
        self.options.tls = true;
        self
    }

    pub fn tls_verify(mut self, verify: bool) -> Self {
        self.options.tls_verify = Some(verify);
        self
    }

    pub fn tls_cert(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.tls_cert = Some(path.into());
        self
    }

    pub fn tls_key(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.tls_key = Some(path.into());
        self
    }

    pub fn tls_ca(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.tls_ca = Some(path.into());
        self
    }

    pub fn debug(mut self) -> Self {
        self.options.debug = true;
        self
    }

    pub fn log_level(mut self, level: &str) -> Self {
        self.options.log_level = Some(level.to_string());
        self
    }

    pub fn args(mut self, args: &[&str]) -> Self {
        self.options.args = args.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn env_host(mut self, host: &str) -> Self {
        self.env.host = Some(host.to_string());
        self
    }

    pub fn env_tls_verify(mut self, value: &str) -> Self {
        self.env.tls_verify = Some(value.to_string());
        self
    }

    /// Point `BERTH_CERT_PATH` at `path`.
    pub fn env_cert_path(mut self, path: &Path) -> Self {
        self.env.cert_path = Some(path.display().to_string());
        self
    }

    pub fn options(&self) -> &StartupOptions {
        &self.options
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }
}

impl Default for TestStartup {
    fn default() -> Self {
        Self::new()
    }
}
