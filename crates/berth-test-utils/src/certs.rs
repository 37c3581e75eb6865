//! PEM fixtures for TLS tests.
//!
//! A throwaway P-256 CA plus a server certificate (`localhost`,
//! `127.0.0.1`) and a client certificate, all signed by that CA. Valid
//! until 2126.

use std::path::{Path, PathBuf};

use berth_config::{DEFAULT_CA_FILE, DEFAULT_CERT_FILE, DEFAULT_KEY_FILE};

pub const CA_PEM: &str = include_str!("../fixtures/ca.pem");
pub const SERVER_CERT_PEM: &str = include_str!("../fixtures/server-cert.pem");
pub const SERVER_KEY_PEM: &str = include_str!("../fixtures/server-key.pem");
pub const CLIENT_CERT_PEM: &str = include_str!("../fixtures/client-cert.pem");
pub const CLIENT_KEY_PEM: &str = include_str!("../fixtures/client-key.pem");

/// Paths of PEM files written into a test directory.
#[derive(Debug, Clone)]
pub struct TestCerts {
    pub ca: PathBuf,
    pub cert: PathBuf,
    pub key: PathBuf,
}

impl TestCerts {
    /// Write the CA and client credentials under their default names
    /// (`ca.pem`, `cert.pem`, `key.pem`).
    pub fn write_client_defaults(dir: &Path) -> Self {
        Self::write(dir, DEFAULT_CA_FILE, CLIENT_CERT_PEM, CLIENT_KEY_PEM)
    }

    /// Write the CA and server credentials as `ca.pem`, `server-cert.pem`
    /// and `server-key.pem`.
    pub fn write_server(dir: &Path) -> Self {
        let certs = Self {
            ca: dir.join(DEFAULT_CA_FILE),
            cert: dir.join("server-cert.pem"),
            key: dir.join("server-key.pem"),
        };
        write_file(&certs.ca, CA_PEM);
        write_file(&certs.cert, SERVER_CERT_PEM);
        write_file(&certs.key, SERVER_KEY_PEM);
        certs
    }

    fn write(dir: &Path, ca_name: &str, cert_pem: &str, key_pem: &str) -> Self {
        let certs = Self {
            ca: dir.join(ca_name),
            cert: dir.join(DEFAULT_CERT_FILE),
            key: dir.join(DEFAULT_KEY_FILE),
        };
        write_file(&certs.ca, CA_PEM);
        write_file(&certs.cert, cert_pem);
        write_file(&certs.key, key_pem);
        certs
    }
}

fn write_file(path: &Path, contents: &str) {
    std::fs::write(path, contents)
        .unwrap_or_else(|e| panic!("failed to write {}: {e}", path.display()));
}
