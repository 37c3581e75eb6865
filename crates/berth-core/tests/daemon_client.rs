//! Client requests against a live daemon and against a bare TLS endpoint.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use berth_config::AppConfig;
use berth_config::runtime::NetworkMode;
use berth_core::api::PING_OK;
use berth_core::build_info;
use berth_core::tls::{self, TrustOptions};
use berth_core::{Client, CommandError, Daemon, Endpoint, StatusError, Transport};
use berth_test_utils::certs::{self, TestCerts};
use berth_test_utils::tracing_setup::init_test_tracing;
use pretty_assertions::assert_eq;
use rustls::RootCertStore;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

async fn wait_for_socket(path: &Path) {
    for _ in 0..200 {
        if path.exists() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("daemon never created {}", path.display());
}

#[test_log::test(tokio::test)]
async fn unix_socket_round_trip() {
    let dir = TempDir::new().unwrap();
    let socket = dir.path().join("run").join("berth.sock");
    let endpoint = Endpoint::new(Transport::Unix, socket.display().to_string());

    let mut config = AppConfig::default();
    config.daemon.network_mode = NetworkMode::new("bridge");
    let daemon = Daemon::new(config, vec![endpoint.clone()]);
    let shutdown = daemon.shutdown_handle();
    let server = tokio::spawn(async move { daemon.run().await });
    wait_for_socket(&socket).await;

    let client = Client::new(endpoint.clone(), None);
    assert_eq!(client.ping().await.unwrap(), PING_OK);

    let version = client.version().await.unwrap();
    assert_eq!(version.version, build_info::VERSION);
    assert_eq!(version.git_commit, build_info::GIT_HASH);

    let info = client.info().await.unwrap();
    assert_eq!(info.listeners, vec![endpoint.to_string()]);
    assert_eq!(info.network_mode, "bridge");
    assert!(!info.network_predefined);
    assert_eq!(info.pid, std::process::id());

    shutdown.shutdown();
    server.await.unwrap().unwrap();
    assert!(!socket.exists(), "socket file should be removed on shutdown");
}

#[tokio::test]
async fn missing_daemon_reports_connect_error() {
    let dir = TempDir::new().unwrap();
    let endpoint = Endpoint::new(
        Transport::Unix,
        dir.path().join("absent.sock").display().to_string(),
    );

    let err = Client::new(endpoint, None).ping().await.unwrap_err();

    let CommandError::Generic(message) = err else {
        panic!("expected a generic error, got {err:?}");
    };
    assert!(message.contains("Is the daemon running?"));
}

/// Accept one mutually authenticated TLS connection and answer with a fixed
/// HTTP response.
async fn serve_once(response: &'static str) -> u16 {
    init_test_tracing();
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let mut roots = RootCertStore::empty();
    for cert in CertificateDer::pem_slice_iter(certs::CA_PEM.as_bytes()) {
        roots.add(cert.unwrap()).unwrap();
    }
    let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider.clone())
        .build()
        .unwrap();
    let chain = CertificateDer::pem_slice_iter(certs::SERVER_CERT_PEM.as_bytes())
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    let key = PrivateKeyDer::from_pem_slice(certs::SERVER_KEY_PEM.as_bytes()).unwrap();
    let config = rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_client_cert_verifier(verifier)
        .with_single_cert(chain, key)
        .unwrap();
    let acceptor = TlsAcceptor::from(Arc::new(config));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut stream = acceptor.accept(stream).await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream.read(&mut buf).await.unwrap();
            assert!(n > 0, "client closed before sending a request");
            request.extend_from_slice(&buf[..n]);
        }
        stream.write_all(response.as_bytes()).await.unwrap();
        stream.shutdown().await.ok();
    });
    port
}

fn verified_client(port: u16, dir: &Path) -> Client {
    let certs = TestCerts::write_client_defaults(dir);
    let trust = tls::client_config(&TrustOptions {
        cert_file: Some(certs.cert),
        key_file: Some(certs.key),
        ca_file: Some(certs.ca),
        insecure_skip_verify: false,
    })
    .unwrap();
    Client::new(
        Endpoint::new(Transport::Tcp, format!("127.0.0.1:{port}")),
        Some(trust),
    )
}

#[tokio::test]
async fn mutual_tls_ping() {
    let port = serve_once(
        "HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nOK",
    )
    .await;
    let dir = TempDir::new().unwrap();

    let body = verified_client(port, dir.path()).ping().await.unwrap();

    assert_eq!(body, "OK");
}

#[tokio::test]
async fn daemon_error_becomes_status_error() {
    let body = r#"{"message":"no such container"}"#;
    let response: &'static str = Box::leak(
        format!(
            "HTTP/1.1 500 Internal Server Error\r\nContent-Type: application/json\r\n\
             Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
        .into_boxed_str(),
    );
    let port = serve_once(response).await;
    let dir = TempDir::new().unwrap();

    let err = verified_client(port, dir.path()).ping().await.unwrap_err();

    assert_eq!(
        err,
        CommandError::Status(StatusError {
            status_code: 125,
            status: "no such container".to_string(),
        })
    );
}
