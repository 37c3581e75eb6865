//! Recording stand-ins for the daemon and command collaborators.

use std::sync::Mutex;

use berth_config::AppConfig;
use berth_core::{
    BoxFuture, Client, CommandExecutor, CommandOutcome, DaemonRunner, Endpoint,
};

/// A command the [`RecordingExecutor`] was asked to run.
#[derive(Debug, Clone)]
pub struct RecordedCommand {
    pub endpoint: Endpoint,
    pub tls: bool,
    pub insecure_skip_verify: bool,
    pub client_auth: bool,
    pub args: Vec<String>,
}

/// Records every daemon start and returns a fixed outcome.
#[derive(Debug)]
pub struct RecordingDaemon {
    outcome: CommandOutcome,
    runs: Mutex<Vec<(AppConfig, Vec<Endpoint>)>>,
}

impl RecordingDaemon {
    pub fn new() -> Self {
        Self {
            outcome: Ok(()),
            runs: Mutex::default(),
        }
    }

    /// Every call to [`DaemonRunner::run`], in order.
    pub fn runs(&self) -> Vec<(AppConfig, Vec<Endpoint>)> {
        self.runs.lock().expect("daemon runs lock poisoned").clone()
    }
}

impl DaemonRunner for RecordingDaemon {
    fn run(&self, config: AppConfig, listeners: Vec<Endpoint>) -> BoxFuture<'_, CommandOutcome> {
        self.runs
            .lock()
            .expect("daemon runs lock poisoned")
            .push((config, listeners));
        let outcome = self.outcome.clone();
        Box::pin(async move { outcome })
    }
}

/// Records every command and returns a fixed outcome.
#[derive(Debug)]
pub struct RecordingExecutor {
    outcome: CommandOutcome,
    commands: Mutex<Vec<RecordedCommand>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::returning(Ok(()))
    }

    /// Answer every command with `outcome`.
    pub fn returning(outcome: CommandOutcome) -> Self {
        Self {
            outcome,
            commands: Mutex::default(),
        }
    }

    pub fn commands(&self) -> Vec<RecordedCommand> {
        self.commands.lock().expect("commands lock poisoned").clone()
    }
}

impl Default for RecordingDaemon {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for RecordingExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandExecutor for RecordingExecutor {
    fn execute(&self, client: Client, args: Vec<String>) -> BoxFuture<'_, CommandOutcome> {
        let trust = client.trust();
        self.commands
            .lock()
            .expect("commands lock poisoned")
            .push(RecordedCommand {
                endpoint: client.endpoint().clone(),
                tls: trust.is_some(),
                insecure_skip_verify: trust.is_some_and(|t| t.insecure_skip_verify()),
                client_auth: trust.is_some_and(|t| t.has_client_auth()),
                args,
            });
        let outcome = self.outcome.clone();
        Box::pin(async move { outcome })
    }
}
