#![deny(unsafe_code)]

//! berth core: startup bootstrap for the dual-mode `berth` executable.
//!
//! Resolves `-H` host specs into an [`Endpoint`], builds the client TLS
//! trust configuration, picks the daemon or client role, and maps the
//! final outcome to an exit code.

use std::future::Future;
use std::pin::Pin;

/// A type-erased, `Send`-safe, boxed future. Return type of the
/// object-safe collaborator traits in [`dispatch`].
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// JSON bodies exchanged between client and daemon.
pub mod api;
/// Startup sequence tying the other modules together.
pub mod bootstrap;
/// Compile-time build metadata (version, git hash, profile).
pub mod build_info;
/// HTTP client bound to one endpoint, and the built-in commands.
pub mod client;
/// Minimal daemon serving the control API.
pub mod daemon;
/// Role selection and collaborator traits.
pub mod dispatch;
/// Host spec parsing and endpoint resolution.
pub mod endpoint;
/// Log level parsing and subscriber setup.
pub mod logging;
/// Command outcomes and exit code translation.
pub mod outcome;
/// Filesystem helpers.
pub mod system;
/// Client TLS trust bootstrap.
pub mod tls;

pub use bootstrap::{Environment, StartupOptions};
pub use client::{Client, DefaultExecutor};
pub use daemon::{Daemon, DaemonLauncher};
pub use dispatch::{CommandExecutor, DaemonRunner, Dispatcher, ProcessRole, Role};
pub use endpoint::{Endpoint, HostError, MultiHostPolicy, Transport};
pub use outcome::{CommandError, CommandOutcome, Exit, StatusError};
pub use tls::{TlsError, TlsRequest, TrustConfig, TrustOptions};
