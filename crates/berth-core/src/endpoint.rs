//! Host specification parsing and endpoint resolution.
//!
//! A host spec is what the user passes to `-H` or sets in `BERTH_HOST`:
//! `tcp://10.0.0.5:2376`, `unix:///var/run/berth.sock`, `npipe:\\.\pipe\berth`,
//! `fd://3`. Resolution normalizes every spec, then splits it into an
//! [`Endpoint`] with a closed [`Transport`] tag.

use std::fmt;
use std::str::FromStr;

use berth_config::{DEFAULT_LOCAL_ADDR, DEFAULT_TCP_HOST, DEFAULT_TCP_PORT, DEFAULT_UNIX_SOCKET};
use tracing::debug;

/// Separator between scheme and address for everything except named pipes.
const SCHEME_SEPARATOR: &str = "://";

/// Windows-style separator for named pipes (`npipe:\\machine\pipe\name`).
const NPIPE_SEPARATOR: &str = r":\\";

/// Errors from host spec validation and resolution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    #[error("Invalid bind address format: {0}")]
    InvalidFormat(String),

    #[error("Invalid proto, expected {expected}: {addr}")]
    InvalidProto { expected: &'static str, addr: String },

    #[error("Invalid bind address protocol: {0}")]
    UnknownTransport(String),

    #[error("Please specify only one -H")]
    TooManyHosts(usize),
}

/// The connection mechanism named by a host spec's scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    Tcp,
    Unix,
    Npipe,
    Fd,
}

impl Transport {
    /// Lowercase scheme token, as written before the separator.
    pub fn scheme(self) -> &'static str {
        match self {
            Transport::Tcp => "tcp",
            Transport::Unix => "unix",
            Transport::Npipe => "npipe",
            Transport::Fd => "fd",
        }
    }
}

impl FromStr for Transport {
    type Err = HostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Transport::Tcp),
            "unix" => Ok(Transport::Unix),
            "npipe" => Ok(Transport::Npipe),
            "fd" => Ok(Transport::Fd),
            _ => Err(HostError::UnknownTransport(s.to_string())),
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scheme())
    }
}

/// A resolved (transport, address) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub transport: Transport,
    pub address: String,
}

impl Endpoint {
    pub fn new(transport: Transport, address: impl Into<String>) -> Self {
        Self {
            transport,
            address: address.into(),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let separator = match self.transport {
            Transport::Npipe => NPIPE_SEPARATOR,
            _ => SCHEME_SEPARATOR,
        };
        write!(f, "{}{}{}", self.transport, separator, self.address)
    }
}

/// What the client does when handed more than one `-H`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MultiHostPolicy {
    /// Report a usage error and exit with status 1.
    #[default]
    Reject,
    /// Report a usage error but exit with status 0, as older releases did.
    LegacyExitZero,
}

impl MultiHostPolicy {
    pub fn from_legacy_flag(legacy: bool) -> Self {
        if legacy {
            MultiHostPolicy::LegacyExitZero
        } else {
            MultiHostPolicy::Reject
        }
    }

    pub fn exit_code(self) -> i32 {
        match self {
            MultiHostPolicy::Reject => 1,
            MultiHostPolicy::LegacyExitZero => 0,
        }
    }
}

fn has_npipe_scheme(spec: &str) -> bool {
    spec.get(..6)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("npipe:"))
}

/// Validate a single host spec and return its normalized form.
///
/// An empty spec yields [`DEFAULT_LOCAL_ADDR`]; a spec without a scheme is
/// treated as TCP.
pub fn validate_host(spec: &str) -> Result<String, HostError> {
    let spec = spec.trim();
    let spec = if spec.is_empty() {
        DEFAULT_LOCAL_ADDR
    } else {
        spec
    };

    if has_npipe_scheme(spec) {
        let endpoint = split_host(spec)?;
        if endpoint.address.is_empty() {
            return Err(HostError::InvalidFormat(spec.to_string()));
        }
        return Ok(spec.to_string());
    }

    let (scheme, rest) = spec.split_once(SCHEME_SEPARATOR).unwrap_or(("tcp", spec));
    match scheme.parse::<Transport>()? {
        Transport::Tcp => parse_tcp_addr(rest),
        Transport::Unix => parse_unix_addr(rest),
        Transport::Fd => Ok(spec.to_string()),
        Transport::Npipe => Err(HostError::InvalidFormat(spec.to_string())),
    }
}

fn parse_tcp_addr(addr: &str) -> Result<String, HostError> {
    if addr.is_empty() || addr.contains(SCHEME_SEPARATOR) {
        return Err(HostError::InvalidProto {
            expected: "tcp",
            addr: addr.to_string(),
        });
    }

    let (host_port, path) = match addr.find('/') {
        Some(idx) => addr.split_at(idx),
        None => (addr, ""),
    };
    let invalid = || HostError::InvalidFormat(format!("tcp://{addr}"));

    let (host, port) = split_host_port(host_port).ok_or_else(invalid)?;
    let host = if host.is_empty() { DEFAULT_TCP_HOST } else { host };
    let port = if port.is_empty() {
        DEFAULT_TCP_PORT
    } else {
        port.parse::<u16>().map_err(|_| invalid())?
    };

    if host.contains(':') {
        Ok(format!("tcp://[{host}]:{port}{path}"))
    } else {
        Ok(format!("tcp://{host}:{port}{path}"))
    }
}

/// Split `host:port`, `[v6]:port`, `host` or `:port`. Bare IPv6 is rejected.
fn split_host_port(host_port: &str) -> Option<(&str, &str)> {
    if let Some(rest) = host_port.strip_prefix('[') {
        let (host, tail) = rest.split_once(']')?;
        return match tail {
            "" => Some((host, "")),
            _ => tail.strip_prefix(':').map(|port| (host, port)),
        };
    }
    match host_port.rsplit_once(':') {
        Some((host, _)) if host.contains(':') => None,
        Some((host, port)) => Some((host, port)),
        None => Some((host_port, "")),
    }
}

fn parse_unix_addr(addr: &str) -> Result<String, HostError> {
    if addr.contains(SCHEME_SEPARATOR) {
        return Err(HostError::InvalidProto {
            expected: "unix",
            addr: addr.to_string(),
        });
    }
    let path = if addr.is_empty() {
        DEFAULT_UNIX_SOCKET
    } else {
        addr
    };
    Ok(format!("unix://{path}"))
}

/// Split a host spec into transport and address.
///
/// Named pipes split on `:\\` when present; everything else on `://`.
pub fn split_host(spec: &str) -> Result<Endpoint, HostError> {
    let separator = if has_npipe_scheme(spec) && spec.contains(NPIPE_SEPARATOR) {
        NPIPE_SEPARATOR
    } else {
        SCHEME_SEPARATOR
    };
    let (scheme, address) = spec
        .split_once(separator)
        .ok_or_else(|| HostError::InvalidFormat(spec.to_string()))?;
    let transport = scheme.parse::<Transport>()?;
    Ok(Endpoint::new(transport, address))
}

/// Resolve every host the process should use.
///
/// With no `-H` values, `BERTH_HOST` is honored outside daemon mode;
/// otherwise the default local address is used.
pub fn resolve_hosts(
    host_specs: &[String],
    env_host: Option<&str>,
    daemon: bool,
) -> Result<Vec<Endpoint>, HostError> {
    let specs: Vec<&str> = if host_specs.is_empty() {
        let host = match env_host {
            Some(host) if !host.is_empty() && !daemon => host,
            _ => DEFAULT_LOCAL_ADDR,
        };
        vec![host]
    } else {
        host_specs.iter().map(String::as_str).collect()
    };

    specs
        .into_iter()
        .map(|spec| {
            let endpoint = split_host(&validate_host(spec)?)?;
            debug!(spec, endpoint = %endpoint, "Resolved host");
            Ok(endpoint)
        })
        .collect()
}

/// Resolve the single endpoint a client connects to.
///
/// Outside daemon mode more than one host is a usage error.
pub fn resolve(
    host_specs: &[String],
    env_host: Option<&str>,
    daemon: bool,
) -> Result<Endpoint, HostError> {
    let mut endpoints = resolve_hosts(host_specs, env_host, daemon)?;
    if !daemon && endpoints.len() > 1 {
        return Err(HostError::TooManyHosts(endpoints.len()));
    }
    Ok(endpoints.swap_remove(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn hosts(specs: &[&str]) -> Vec<String> {
        specs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_split_scheme_address() {
        let cases = [
            ("tcp://1.2.3.4:2376", Transport::Tcp, "1.2.3.4:2376"),
            ("unix:///var/run/x.sock", Transport::Unix, "/var/run/x.sock"),
            ("fd://3", Transport::Fd, "3"),
            ("npipe:////./pipe/x", Transport::Npipe, "//./pipe/x"),
        ];
        for (spec, transport, address) in cases {
            assert_eq!(split_host(spec).unwrap(), Endpoint::new(transport, address));
        }
    }

    #[test]
    fn test_split_named_pipe_uses_path_separator() {
        let endpoint = split_host(r"NPIPE:\\.\pipe\berth").unwrap();
        assert_eq!(endpoint, Endpoint::new(Transport::Npipe, r".\pipe\berth"));
        assert_eq!(endpoint.to_string(), r"npipe:\\.\pipe\berth");
    }

    #[test]
    fn test_split_requires_two_parts() {
        assert!(matches!(
            split_host("localhost"),
            Err(HostError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_unknown_transport_rejected() {
        assert_eq!(
            validate_host("udp://1.2.3.4:53"),
            Err(HostError::UnknownTransport("udp".to_string()))
        );
    }

    #[test]
    fn test_validate_tcp_defaults() {
        assert_eq!(validate_host("tcp://:7777").unwrap(), "tcp://127.0.0.1:7777");
        assert_eq!(validate_host("10.0.0.5").unwrap(), "tcp://10.0.0.5:2375");
        assert_eq!(
            validate_host("tcp://example.com:2376/prefix").unwrap(),
            "tcp://example.com:2376/prefix"
        );
        assert_eq!(validate_host("tcp://[::1]:2376").unwrap(), "tcp://[::1]:2376");
    }

    #[test]
    fn test_validate_tcp_rejects_garbage() {
        assert!(validate_host("tcp://host:port").is_err());
        assert!(validate_host("tcp://host:99999").is_err());
        assert!(validate_host("tcp://").is_err());
        assert!(validate_host("tcp://tcp://host:1").is_err());
        assert!(validate_host("tcp://::1:2375").is_err());
    }

    #[test]
    fn test_validate_unix_defaults() {
        assert_eq!(validate_host("unix://").unwrap(), "unix:///var/run/berth.sock");
        assert_eq!(validate_host("").unwrap(), DEFAULT_LOCAL_ADDR);
        assert!(validate_host("unix://unix:///x").is_err());
    }

    #[test]
    fn test_validate_npipe_requires_address() {
        assert!(validate_host(r"npipe:\\.\pipe\berth").is_ok());
        assert!(validate_host(r"npipe:\\").is_err());
        assert!(validate_host("npipe:").is_err());
    }

    #[test]
    fn test_resolve_default_when_nothing_given() {
        let endpoint = resolve(&[], Some(""), false).unwrap();
        assert_eq!(endpoint, Endpoint::new(Transport::Unix, DEFAULT_UNIX_SOCKET));
        assert_eq!(endpoint.to_string(), DEFAULT_LOCAL_ADDR);
    }

    #[test]
    fn test_resolve_env_override() {
        let endpoint = resolve(&[], Some("tcp://9.9.9.9:1234"), false).unwrap();
        assert_eq!(endpoint.transport, Transport::Tcp);
        assert_eq!(endpoint.address, "9.9.9.9:1234");
    }

    #[test]
    fn test_resolve_env_ignored_in_daemon_mode() {
        let endpoint = resolve(&[], Some("tcp://9.9.9.9:1234"), true).unwrap();
        assert_eq!(endpoint.transport, Transport::Unix);
    }

    #[test]
    fn test_resolve_flags_win_over_env() {
        let endpoint = resolve(&hosts(&["unix:///tmp/b.sock"]), Some("tcp://9.9.9.9:1"), false)
            .unwrap();
        assert_eq!(endpoint, Endpoint::new(Transport::Unix, "/tmp/b.sock"));
    }

    #[test]
    fn test_resolve_rejects_two_hosts_for_client() {
        let specs = hosts(&["tcp://1.1.1.1:1", "tcp://2.2.2.2:2"]);
        assert_eq!(resolve(&specs, None, false), Err(HostError::TooManyHosts(2)));
    }

    #[test]
    fn test_resolve_hosts_keeps_all_for_daemon() {
        let specs = hosts(&["tcp://0.0.0.0:2375", "unix:///tmp/d.sock"]);
        let endpoints = resolve_hosts(&specs, None, true).unwrap();
        assert_eq!(endpoints.len(), 2);
        assert_eq!(endpoints[0].address, "0.0.0.0:2375");
    }

    #[test]
    fn test_resolve_propagates_validation_error() {
        let specs = hosts(&["tcp://nope:x"]);
        assert!(matches!(
            resolve(&specs, None, false),
            Err(HostError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_multi_host_policy_exit_codes() {
        assert_eq!(MultiHostPolicy::default().exit_code(), 1);
        assert_eq!(MultiHostPolicy::from_legacy_flag(true).exit_code(), 0);
    }
}
