//! Client handle speaking HTTP/1.1 to the daemon over the resolved endpoint.
//!
//! TCP endpoints are wrapped in TLS when a [`TrustConfig`] is present; Unix
//! endpoints are always plaintext. Non-2xx answers become a
//! [`StatusError`] carrying the daemon's message.

use std::io::Write;

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::HOST;
use hyper::{Method, Request};
use hyper_util::rt::TokioIo;
use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, UnixStream};
use tracing::{debug, warn};

use crate::BoxFuture;
use crate::api::{ErrorResponse, InfoResponse, VersionResponse};
use crate::dispatch::{CommandExecutor, HELP_FLAG};
use crate::endpoint::{Endpoint, Transport};
use crate::outcome::{CommandError, CommandOutcome, DAEMON_ERROR_EXIT, StatusError};
use crate::tls::TrustConfig;

/// Commands understood by [`DefaultExecutor`], with one-line help.
pub const COMMANDS: &[(&str, &str)] = &[
    ("info", "Display daemon-wide information"),
    ("ping", "Check that the daemon is reachable"),
    ("version", "Show the client and daemon version information"),
];

/// A connection target plus the TLS settings used to reach it.
#[derive(Debug, Clone)]
pub struct Client {
    endpoint: Endpoint,
    trust: Option<TrustConfig>,
}

impl Client {
    pub fn new(endpoint: Endpoint, trust: Option<TrustConfig>) -> Self {
        Self { endpoint, trust }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn trust(&self) -> Option<&TrustConfig> {
        self.trust.as_ref()
    }

    /// `GET /_ping`.
    pub async fn ping(&self) -> Result<String, CommandError> {
        let body = self.request(Method::GET, "/_ping").await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    /// `GET /version`.
    pub async fn version(&self) -> Result<VersionResponse, CommandError> {
        let body = self.request(Method::GET, "/version").await?;
        serde_json::from_slice(&body)
            .map_err(|e| CommandError::Generic(format!("invalid version response: {e}")))
    }

    /// `GET /info`.
    pub async fn info(&self) -> Result<InfoResponse, CommandError> {
        let body = self.request(Method::GET, "/info").await?;
        serde_json::from_slice(&body)
            .map_err(|e| CommandError::Generic(format!("invalid info response: {e}")))
    }

    fn connect_error(&self, err: impl std::fmt::Display) -> CommandError {
        CommandError::Generic(format!(
            "Cannot connect to the berth daemon at {}. Is the daemon running? ({err})",
            self.endpoint
        ))
    }

    async fn request(&self, method: Method, path: &str) -> Result<Bytes, CommandError> {
        debug!(%method, path, endpoint = %self.endpoint, "Daemon request");
        match self.endpoint.transport {
            Transport::Tcp => {
                let (authority, prefix) = match self.endpoint.address.find('/') {
                    Some(idx) => self.endpoint.address.split_at(idx),
                    None => (self.endpoint.address.as_str(), ""),
                };
                let req = build_request(method, &format!("{prefix}{path}"), authority)?;
                let stream = TcpStream::connect(authority)
                    .await
                    .map_err(|e| self.connect_error(e))?;
                match &self.trust {
                    Some(trust) => {
                        let host = authority
                            .rsplit_once(':')
                            .map_or(authority, |(host, _)| host)
                            .trim_start_matches('[')
                            .trim_end_matches(']');
                        let server_name =
                            ServerName::try_from(host.to_string()).map_err(|e| {
                                CommandError::Generic(format!(
                                    "invalid TLS server name {host:?}: {e}"
                                ))
                            })?;
                        let stream = trust
                            .connector()
                            .connect(server_name, stream)
                            .await
                            .map_err(|e| self.connect_error(e))?;
                        send(stream, req).await
                    }
                    None => send(stream, req).await,
                }
            }
            Transport::Unix => {
                let req = build_request(method, path, "berth")?;
                let stream = UnixStream::connect(&self.endpoint.address)
                    .await
                    .map_err(|e| self.connect_error(e))?;
                if self.trust.is_some() {
                    warn!("TLS settings are ignored for unix sockets");
                }
                send(stream, req).await
            }
            Transport::Npipe | Transport::Fd => Err(CommandError::Generic(format!(
                "the {} transport is not supported by this client",
                self.endpoint.transport
            ))),
        }
    }
}

fn build_request(method: Method, uri: &str, host: &str) -> Result<Request<Full<Bytes>>, CommandError> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(HOST, host)
        .body(Full::new(Bytes::new()))
        .map_err(|e| CommandError::Generic(format!("failed to build request: {e}")))
}

/// Run one request over an established stream.
async fn send<S>(stream: S, req: Request<Full<Bytes>>) -> Result<Bytes, CommandError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
        .await
        .map_err(|e| CommandError::Generic(format!("HTTP handshake failed: {e}")))?;

    // Drive the connection in the background
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            warn!(error = %e, "Daemon connection error");
        }
    });

    let resp = sender
        .send_request(req)
        .await
        .map_err(|e| CommandError::Generic(format!("request failed: {e}")))?;
    let status = resp.status();
    let body = resp
        .into_body()
        .collect()
        .await
        .map_err(|e| CommandError::Generic(format!("failed to read response body: {e}")))?
        .to_bytes();

    if !status.is_success() {
        let message = serde_json::from_slice::<ErrorResponse>(&body)
            .map(|err| err.message)
            .unwrap_or_default();
        debug!(%status, daemon_message = %message, "Daemon returned an error");
        return Err(StatusError {
            status_code: DAEMON_ERROR_EXIT,
            status: message,
        }
        .into());
    }
    Ok(body)
}

/// The built-in client commands.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultExecutor;

impl CommandExecutor for DefaultExecutor {
    fn execute(&self, client: Client, args: Vec<String>) -> BoxFuture<'_, CommandOutcome> {
        Box::pin(async move { run_command(&client, &args).await })
    }
}

fn print_commands() {
    let mut out = std::io::stdout().lock();
    let _ = writeln!(out, "Usage: berth [OPTIONS] COMMAND\n\nCommands:");
    for (name, help) in COMMANDS {
        let _ = writeln!(out, "    {name:<10}{help}");
    }
}

fn print_command_help(name: &str) -> CommandOutcome {
    let (_, help) = COMMANDS
        .iter()
        .find(|(command, _)| *command == name)
        .ok_or_else(|| unknown_command(name))?;
    println!("Usage: berth {name}\n\n{help}");
    Ok(())
}

fn unknown_command(name: &str) -> CommandError {
    CommandError::Generic(format!(
        "berth: '{name}' is not a berth command.\nSee 'berth --help'."
    ))
}

async fn run_command(client: &Client, args: &[String]) -> CommandOutcome {
    let Some((name, rest)) = args.split_first() else {
        print_commands();
        return Ok(());
    };
    if matches!(rest, [flag] if flag == HELP_FLAG || flag == "-h") {
        return print_command_help(name);
    }
    if !rest.is_empty() {
        return Err(CommandError::Generic(format!(
            "\"berth {name}\" accepts no arguments."
        )));
    }

    match name.as_str() {
        "help" => {
            print_commands();
            Ok(())
        }
        "ping" => {
            println!("{}", client.ping().await?);
            Ok(())
        }
        "version" => {
            let local = VersionResponse::current();
            println!("Client:\n Version:      {}\n Git commit:   {}", local.version, local.git_commit);
            let server = client.version().await?;
            println!(
                "\nServer:\n Version:      {}\n Git commit:   {}\n OS/Arch:      {}/{}\n Experimental: {}",
                server.version, server.git_commit, server.os, server.arch, server.experimental
            );
            Ok(())
        }
        "info" => {
            let info = client.info().await?;
            println!("Listeners:    {}", info.listeners.join(", "));
            println!("Isolation:    {}", info.isolation);
            println!("Network mode: {}", info.network_mode);
            println!("Log level:    {}", info.log_level);
            println!("Debug mode:   {}", info.debug);
            println!("Uptime:       {}s", info.uptime_secs);
            Ok(())
        }
        other => Err(unknown_command(other)),
    }
}
