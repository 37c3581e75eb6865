#![deny(unsafe_code)]

//! berth: container engine daemon and client in one executable.
//!
//! `-d` selects the daemon role; otherwise the trailing arguments name a
//! client command run against the single resolved `-H` endpoint.

use std::ffi::OsString;
use std::path::PathBuf;

use berth_core::outcome::translate;
use berth_core::{
    CommandError, DaemonLauncher, DefaultExecutor, Dispatcher, Environment, StartupOptions,
    bootstrap,
};
use clap::{CommandFactory, Parser};

/// A self-sufficient runtime for containers.
#[derive(Parser, Debug)]
#[command(
    name = "berth",
    disable_help_flag = true,
    disable_version_flag = true,
    override_usage = "berth [OPTIONS] COMMAND [ARG...]\n       berth -d [-H HOST]..."
)]
struct Cli {
    /// Daemon socket(s) to connect to or listen on.
    #[arg(short = 'H', long = "host", value_name = "HOST")]
    hosts: Vec<String>,

    /// Run as the daemon.
    #[arg(short = 'd', long = "daemon")]
    daemon: bool,

    /// Use TLS; implied by --tlsverify.
    #[arg(long)]
    tls: bool,

    /// Use TLS and verify the remote.
    #[arg(
        long = "tlsverify",
        value_name = "BOOL",
        num_args = 0..=1,
        default_missing_value = "true",
        require_equals = true
    )]
    tls_verify: Option<bool>,

    /// Path to TLS certificate file.
    #[arg(long = "tlscert", value_name = "FILE")]
    tls_cert: Option<PathBuf>,

    /// Path to TLS key file.
    #[arg(long = "tlskey", value_name = "FILE")]
    tls_key: Option<PathBuf>,

    /// Trust certs signed only by this CA.
    #[arg(long = "tlscacert", value_name = "FILE")]
    tls_ca: Option<PathBuf>,

    /// Location of client config files.
    #[arg(long = "config", value_name = "DIR")]
    config: Option<PathBuf>,

    /// Set the logging level ("debug", "info", "warn", "error", "fatal").
    #[arg(short = 'l', long = "log-level", value_name = "LEVEL")]
    log_level: Option<String>,

    /// Enable debug mode.
    #[arg(short = 'D', long = "debug")]
    debug: bool,

    /// Print version information and quit.
    #[arg(short = 'v', long = "version")]
    version: bool,

    /// Print usage.
    #[arg(short = 'h', long = "help")]
    help: bool,

    /// The command to run and its arguments.
    #[arg(
        value_name = "COMMAND",
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    args: Vec<String>,
}

impl Cli {
    fn into_options(self) -> StartupOptions {
        StartupOptions {
            hosts: self.hosts,
            daemon: self.daemon,
            tls: self.tls,
            tls_verify: self.tls_verify,
            tls_cert: self.tls_cert,
            tls_key: self.tls_key,
            tls_ca: self.tls_ca,
            config_dir: self.config,
            log_level: self.log_level,
            debug: self.debug,
            version: self.version,
            help: self.help,
            usage: Cli::command().render_help().to_string(),
            args: self.args,
        }
    }
}

/// Exit code for a command line clap cannot parse.
const USAGE_EXIT: i32 = 2;

/// Parse `argv` into startup options; parse failures become a usage error.
fn parse_options<I, T>(argv: I) -> Result<StartupOptions, CommandError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    Cli::try_parse_from(argv)
        .map(Cli::into_options)
        .map_err(|e| CommandError::Usage {
            message: e.render().to_string().trim_end().to_string(),
            exit_code: USAGE_EXIT,
        })
}

#[tokio::main]
async fn main() {
    let dispatcher = Dispatcher::new(&DaemonLauncher, &DefaultExecutor);
    let outcome = match parse_options(std::env::args_os()) {
        Ok(options) => bootstrap::run(&options, &Environment::from_process(), &dispatcher).await,
        Err(err) => Err(err),
    };
    translate(&outcome).terminate()
}
