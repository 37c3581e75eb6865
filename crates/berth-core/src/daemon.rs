//! The berth daemon: listener setup, control API, and shutdown.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::extract::State;
use axum::routing::get;
use berth_config::AppConfig;
use berth_config::runtime::is_predefined_network;
use tokio::net::{TcpListener, UnixListener};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::BoxFuture;
use crate::api::{InfoResponse, PING_OK, VersionResponse};
use crate::dispatch::DaemonRunner;
use crate::endpoint::{Endpoint, Transport};
use crate::logging;
use crate::outcome::{CommandError, CommandOutcome};

/// Requests a graceful stop of a [`Daemon`], before or after it starts.
#[derive(Debug, Clone)]
pub struct ShutdownHandle(Arc<watch::Sender<bool>>);

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.0.send_replace(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.0.borrow()
    }
}

/// Errors from the daemon runtime.
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("can't listen on {0}: transport not supported on this platform")]
    UnsupportedTransport(Endpoint),

    #[error("failed to listen on {endpoint}: {source}")]
    Bind {
        endpoint: Endpoint,
        source: std::io::Error,
    },
}

/// State shared by the route handlers.
struct DaemonState {
    config: AppConfig,
    listeners: Vec<String>,
    started_at: Instant,
}

/// The berth daemon.
pub struct Daemon {
    config: AppConfig,
    listeners: Vec<Endpoint>,
    shutdown: ShutdownHandle,
}

impl Daemon {
    /// Create a daemon that will serve on `listeners`.
    pub fn new(config: AppConfig, listeners: Vec<Endpoint>) -> Self {
        // The stop flag outlives its receivers, so an early request is kept.
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            config,
            listeners,
            shutdown: ShutdownHandle(Arc::new(shutdown_tx)),
        }
    }

    /// Build the control API router.
    pub fn router(&self) -> axum::Router {
        let state = Arc::new(DaemonState {
            config: self.config.clone(),
            listeners: self.listeners.iter().map(ToString::to_string).collect(),
            started_at: Instant::now(),
        });
        axum::Router::new()
            .route("/_ping", get(handle_ping))
            .route("/version", get(handle_version))
            .route("/info", get(handle_info))
            .with_state(state)
    }

    /// Bind every listener and serve until Ctrl-C or [`Daemon::shutdown`].
    pub async fn run(&self) -> Result<(), DaemonError> {
        if let Some(endpoint) = self
            .listeners
            .iter()
            .find(|e| matches!(e.transport, Transport::Npipe | Transport::Fd))
        {
            return Err(DaemonError::UnsupportedTransport(endpoint.clone()));
        }

        info!(
            listeners = self.listeners.len(),
            isolation = %self.config.daemon.isolation,
            network_mode = %self.config.daemon.network_mode,
            "berth daemon starting"
        );

        if self.shutdown.is_shutdown() {
            info!("Shutdown requested before start, not binding listeners");
            return Ok(());
        }

        let app = self.router();
        let mut servers = JoinSet::new();
        let mut sockets = Vec::new();
        for endpoint in &self.listeners {
            let result = self.serve(endpoint, &app, &mut servers).await;
            if endpoint.transport == Transport::Unix && result.is_ok() {
                sockets.push(endpoint.address.as_str());
            }
            if let Err(e) = result {
                self.shutdown.shutdown();
                servers.shutdown().await;
                remove_sockets(&sockets);
                return Err(e);
            }
        }

        let mut shutdown_rx = self.shutdown.0.subscribe();
        let stop_requested = async move {
            let _ = shutdown_rx.wait_for(|stop| *stop).await;
        };
        tokio::select! {
            _ = stop_requested => {
                info!("Shutdown signal received, stopping daemon");
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("Ctrl-C received, initiating graceful shutdown");
                self.shutdown.shutdown();
            }
        }

        while let Some(result) = servers.join_next().await {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(error = %e, "API server failed"),
                Err(e) => error!(error = %e, "API server task panicked"),
            }
        }

        remove_sockets(&sockets);
        info!("Daemon stopped");
        Ok(())
    }

    /// Bind `endpoint` and spawn its server onto `servers`.
    async fn serve(
        &self,
        endpoint: &Endpoint,
        app: &axum::Router,
        servers: &mut JoinSet<std::io::Result<()>>,
    ) -> Result<(), DaemonError> {
        let mut shutdown_rx = self.shutdown.0.subscribe();
        let shutdown = async move {
            let _ = shutdown_rx.wait_for(|stop| *stop).await;
        };
        let app = app.clone();
        let bind_error = |source| DaemonError::Bind {
            endpoint: endpoint.clone(),
            source,
        };
        match endpoint.transport {
            Transport::Tcp => {
                let addr = endpoint.address.split('/').next().unwrap_or_default();
                let listener = TcpListener::bind(addr).await.map_err(bind_error)?;
                info!(endpoint = %endpoint, "API listening");
                servers.spawn(async move {
                    axum::serve(listener, app)
                        .with_graceful_shutdown(shutdown)
                        .await
                });
            }
            Transport::Unix => {
                let listener = bind_unix(Path::new(&endpoint.address)).map_err(bind_error)?;
                info!(endpoint = %endpoint, "API listening");
                servers.spawn(async move {
                    axum::serve(listener, app)
                        .with_graceful_shutdown(shutdown)
                        .await
                });
            }
            Transport::Npipe | Transport::Fd => {
                return Err(DaemonError::UnsupportedTransport(endpoint.clone()));
            }
        }
        Ok(())
    }

    /// Request a graceful shutdown of the daemon.
    pub fn shutdown(&self) {
        self.shutdown.shutdown();
    }

    /// A handle that can stop the daemon from another task.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn listeners(&self) -> &[Endpoint] {
        &self.listeners
    }
}

fn remove_sockets(paths: &[&str]) {
    for path in paths {
        if let Err(e) = std::fs::remove_file(path) {
            warn!(path, error = %e, "Failed to remove socket file");
        }
    }
}

/// Remove a stale socket file, create the parent directory, and bind.
fn bind_unix(path: &Path) -> std::io::Result<UnixListener> {
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    UnixListener::bind(path)
}

async fn handle_ping() -> &'static str {
    PING_OK
}

async fn handle_version() -> Json<VersionResponse> {
    Json(VersionResponse::current())
}

async fn handle_info(State(state): State<Arc<DaemonState>>) -> Json<InfoResponse> {
    let network_mode = &state.config.daemon.network_mode;
    Json(InfoResponse {
        pid: std::process::id(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        listeners: state.listeners.clone(),
        isolation: state.config.daemon.isolation.to_string(),
        network_mode: network_mode.to_string(),
        network_predefined: is_predefined_network(network_mode.network_name()),
        debug: logging::debug_enabled(),
        log_level: state.config.logging.level.clone(),
    })
}

/// Starts a [`Daemon`] when the process takes the daemon role.
#[derive(Debug, Default, Clone, Copy)]
pub struct DaemonLauncher;

impl DaemonRunner for DaemonLauncher {
    fn run(&self, config: AppConfig, listeners: Vec<Endpoint>) -> BoxFuture<'_, CommandOutcome> {
        Box::pin(async move {
            Daemon::new(config, listeners)
                .run()
                .await
                .map_err(CommandError::generic)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_daemon_rejects_named_pipe() {
        let daemon = Daemon::new(
            AppConfig::default(),
            vec![Endpoint::new(Transport::Npipe, r".\pipe\berth")],
        );
        let err = daemon.run().await.unwrap_err();
        assert!(matches!(err, DaemonError::UnsupportedTransport(_)));
    }

    #[tokio::test]
    async fn test_shutdown_before_run_returns_promptly() {
        let dir = tempfile::TempDir::new().unwrap();
        let socket = dir.path().join("early.sock");
        let daemon = Daemon::new(
            AppConfig::default(),
            vec![Endpoint::new(Transport::Unix, socket.display().to_string())],
        );
        daemon.shutdown_handle().shutdown();

        let result = tokio::time::timeout(Duration::from_secs(3), daemon.run()).await;

        assert!(matches!(result, Ok(Ok(()))), "run() must honor an early shutdown");
        assert!(!socket.exists());
    }

    #[tokio::test]
    async fn test_failed_bind_removes_earlier_sockets() {
        let dir = tempfile::TempDir::new().unwrap();
        let socket = dir.path().join("first.sock");
        let daemon = Daemon::new(
            AppConfig::default(),
            vec![
                Endpoint::new(Transport::Unix, socket.display().to_string()),
                Endpoint::new(Transport::Tcp, "256.0.0.1:2375"),
            ],
        );

        let err = daemon.run().await.unwrap_err();

        assert!(matches!(err, DaemonError::Bind { .. }));
        assert!(!socket.exists(), "socket bound before the failure must be removed");
    }

    #[tokio::test]
    async fn test_bind_failure_reports_endpoint() {
        let daemon = Daemon::new(
            AppConfig::default(),
            vec![Endpoint::new(Transport::Tcp, "256.0.0.1:2375")],
        );
        let err = daemon.run().await.unwrap_err();
        assert!(err.to_string().contains("tcp://256.0.0.1:2375"));
    }
}
