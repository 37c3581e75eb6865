//! Process role selection and hand-off.
//!
//! The role is decided once. Daemon mode hands the process to a
//! [`DaemonRunner`] which owns it until shutdown; client mode builds a
//! [`Client`] and runs exactly one command through a [`CommandExecutor`].

use berth_config::AppConfig;
use tracing::{debug, info};

use crate::BoxFuture;
use crate::client::Client;
use crate::endpoint::Endpoint;
use crate::outcome::CommandOutcome;
use crate::tls::TrustConfig;

/// The two mutually exclusive process roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessRole {
    Daemon,
    Client,
}

impl ProcessRole {
    pub fn from_flag(daemon: bool) -> Self {
        if daemon {
            ProcessRole::Daemon
        } else {
            ProcessRole::Client
        }
    }
}

/// Starts the long-running daemon.
pub trait DaemonRunner: Send + Sync {
    /// Serve on `listeners` until shutdown.
    fn run(&self, config: AppConfig, listeners: Vec<Endpoint>) -> BoxFuture<'_, CommandOutcome>;
}

/// Executes a single client command.
pub trait CommandExecutor: Send + Sync {
    fn execute(&self, client: Client, args: Vec<String>) -> BoxFuture<'_, CommandOutcome>;
}

/// Everything one role needs once startup has resolved its inputs.
#[derive(Debug)]
pub enum Role {
    Daemon {
        config: AppConfig,
        listeners: Vec<Endpoint>,
    },
    Client {
        endpoint: Endpoint,
        trust: Option<TrustConfig>,
        args: Vec<String>,
    },
}

impl Role {
    pub fn kind(&self) -> ProcessRole {
        match self {
            Role::Daemon { .. } => ProcessRole::Daemon,
            Role::Client { .. } => ProcessRole::Client,
        }
    }
}

/// Routes a resolved [`Role`] to its collaborator.
pub struct Dispatcher<'a> {
    daemon: &'a dyn DaemonRunner,
    executor: &'a dyn CommandExecutor,
}

impl<'a> Dispatcher<'a> {
    pub fn new(daemon: &'a dyn DaemonRunner, executor: &'a dyn CommandExecutor) -> Self {
        Self { daemon, executor }
    }

    /// Print the global usage text for `role`.
    pub fn usage(&self, role: ProcessRole, usage: &str) -> CommandOutcome {
        debug!(?role, "Help requested");
        print!("{usage}");
        Ok(())
    }

    /// Run `role`. With `help` set, the daemon role and a client without a
    /// command print `usage`; a client command gets `--help` appended.
    pub async fn dispatch(&self, help: bool, usage: &str, role: Role) -> CommandOutcome {
        let kind = role.kind();
        if usage_only(help, kind, role_args(&role)) {
            return self.usage(kind, usage);
        }

        match role {
            Role::Daemon { config, listeners } => {
                info!(listeners = listeners.len(), "Entering daemon mode");
                self.daemon.run(config, listeners).await
            }
            Role::Client {
                endpoint,
                trust,
                mut args,
            } => {
                if help {
                    args.push(HELP_FLAG.to_string());
                }
                debug!(endpoint = %endpoint, tls = trust.is_some(), "Entering client mode");
                let client = Client::new(endpoint, trust);
                self.executor.execute(client, args).await
            }
        }
    }
}

/// Appended to a client command when `-h` accompanies it.
pub const HELP_FLAG: &str = "--help";

/// Whether `-h` is answered with the global usage text instead of being
/// passed on to a client command.
pub fn usage_only(help: bool, role: ProcessRole, args: &[String]) -> bool {
    help && (role == ProcessRole::Daemon || args.is_empty())
}

fn role_args(role: &Role) -> &[String] {
    match role {
        Role::Daemon { .. } => &[],
        Role::Client { args, .. } => args,
    }
}
