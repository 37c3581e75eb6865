//! Command outcomes and their translation into a process exit.
//!
//! Every stage of startup reports failure as a [`CommandError`]; only
//! [`Exit::terminate`] ends the process.

use std::fmt;
use std::io::Write;

use tracing::debug;

/// Exit code used when the daemon answers a request with an error.
pub const DAEMON_ERROR_EXIT: i32 = 125;

/// A failure carrying a remote-reported status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusError {
    /// Numeric status; becomes the exit code when `status` is empty.
    pub status_code: i32,
    /// Human-readable status message, possibly empty.
    pub status: String,
}

impl fmt::Display for StatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Status: {}, Code: {}", self.status, self.status_code)
    }
}

impl std::error::Error for StatusError {}

/// Why a command did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Status(#[from] StatusError),

    #[error("{0}")]
    Generic(String),

    /// A usage error whose exit code is decided by policy.
    #[error("{message}")]
    Usage { message: String, exit_code: i32 },
}

impl CommandError {
    pub fn generic(err: impl fmt::Display) -> Self {
        CommandError::Generic(err.to_string())
    }
}

/// Result of running the process: success or a [`CommandError`].
pub type CommandOutcome = Result<(), CommandError>;

/// Exit code plus what to write to stderr before exiting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exit {
    pub code: i32,
    pub stderr: Option<String>,
}

impl Exit {
    pub fn success() -> Self {
        Self {
            code: 0,
            stderr: None,
        }
    }

    /// Write the stderr text, if any, and exit the process.
    pub fn terminate(self) -> ! {
        if let Some(text) = &self.stderr {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{text}");
            let _ = stderr.flush();
        }
        std::process::exit(self.code)
    }
}

/// Map an outcome to an exit code and stderr text.
pub fn translate(outcome: &CommandOutcome) -> Exit {
    let exit = match outcome {
        Ok(()) => Exit::success(),
        Err(CommandError::Status(status)) if !status.status.is_empty() => Exit {
            code: 1,
            stderr: Some(status.status.clone()),
        },
        Err(CommandError::Status(status)) => Exit {
            code: status.status_code,
            stderr: None,
        },
        Err(CommandError::Generic(message)) => Exit {
            code: 1,
            stderr: Some(message.clone()),
        },
        Err(CommandError::Usage { message, exit_code }) => Exit {
            code: *exit_code,
            stderr: Some(message.clone()),
        },
    };
    debug!(code = exit.code, "Exiting");
    exit
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn exit(code: i32, stderr: Option<&str>) -> Exit {
        Exit {
            code,
            stderr: stderr.map(str::to_string),
        }
    }

    #[test]
    fn test_success() {
        assert_eq!(translate(&Ok(())), exit(0, None));
    }

    #[test]
    fn test_status_with_message_exits_one() {
        let outcome = Err(CommandError::from(StatusError {
            status_code: 0,
            status: "server refused".to_string(),
        }));
        assert_eq!(translate(&outcome), exit(1, Some("server refused")));
    }

    #[test]
    fn test_status_without_message_uses_code() {
        let outcome = Err(CommandError::from(StatusError {
            status_code: 42,
            status: String::new(),
        }));
        assert_eq!(translate(&outcome), exit(42, None));
    }

    #[test]
    fn test_generic_error() {
        let outcome = Err(CommandError::Generic("boom".to_string()));
        assert_eq!(translate(&outcome), exit(1, Some("boom")));
    }

    #[test]
    fn test_usage_error_uses_its_code() {
        let outcome = Err(CommandError::Usage {
            message: "Please specify only one -H".to_string(),
            exit_code: 0,
        });
        assert_eq!(
            translate(&outcome),
            exit(0, Some("Please specify only one -H"))
        );
    }
}
