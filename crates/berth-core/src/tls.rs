//! Client TLS trust bootstrap.
//!
//! Turns the `--tls*` flags and the PEM files they point at into a rustls
//! [`ClientConfig`]. Default credential paths that do not exist are
//! dropped so a client can run with only a CA (or nothing at all); paths the
//! user typed are always loaded and fail loudly.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use berth_config::{DEFAULT_CA_FILE, DEFAULT_CERT_FILE, DEFAULT_KEY_FILE};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use tokio_rustls::TlsConnector;
use tracing::{debug, warn};
use zeroize::Zeroizing;

/// Errors raised while building the client trust configuration.
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("could not read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("could not parse certificate {}: {reason}", path.display())]
    Certificate { path: PathBuf, reason: String },

    #[error(
        "could not load private key {}: {reason}. Make sure the key is not encrypted",
        path.display()
    )]
    PrivateKey { path: PathBuf, reason: String },

    #[error("a client {present} was given without a matching {missing}")]
    IncompletePair {
        present: &'static str,
        missing: &'static str,
    },

    #[error("TLS configuration error: {0}")]
    Config(String),
}

/// What the user asked for on the command line and in the environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TlsRequest {
    /// `--tls` was given.
    pub tls: bool,
    /// `--tlsverify` was given, with its value (`--tlsverify=false` is `Some(false)`).
    pub tls_verify_flag: Option<bool>,
    /// `BERTH_TLS_VERIFY` is set to a non-empty value.
    pub env_tls_verify: bool,
    /// `--tlscert` was given explicitly.
    pub cert_explicit: bool,
    /// `--tlskey` was given explicitly.
    pub key_explicit: bool,
}

impl TlsRequest {
    /// Any mention of `--tlsverify`, whatever its value, turns TLS on.
    pub fn enabled(&self) -> bool {
        self.tls || self.tls_verify_flag.is_some() || self.env_tls_verify
    }

    /// Whether the server certificate chain is verified.
    pub fn verify(&self) -> bool {
        self.tls_verify_flag.unwrap_or(self.env_tls_verify)
    }
}

/// Credential paths and verification mode for the client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustOptions {
    pub cert_file: Option<PathBuf>,
    pub key_file: Option<PathBuf>,
    pub ca_file: Option<PathBuf>,
    pub insecure_skip_verify: bool,
}

impl TrustOptions {
    /// Fill unset paths with the well-known file names under `cert_dir`.
    pub fn with_default_paths(
        cert_dir: &Path,
        cert_file: Option<PathBuf>,
        key_file: Option<PathBuf>,
        ca_file: Option<PathBuf>,
    ) -> Self {
        Self {
            cert_file: Some(cert_file.unwrap_or_else(|| cert_dir.join(DEFAULT_CERT_FILE))),
            key_file: Some(key_file.unwrap_or_else(|| cert_dir.join(DEFAULT_KEY_FILE))),
            ca_file: Some(ca_file.unwrap_or_else(|| cert_dir.join(DEFAULT_CA_FILE))),
            insecure_skip_verify: false,
        }
    }

    /// Drop default cert/key paths that do not exist and set the
    /// verification mode from `request`. Explicit paths are kept as-is.
    pub fn apply_request(mut self, request: &TlsRequest) -> Self {
        self.insecure_skip_verify = !request.verify();
        if !request.cert_explicit {
            self.cert_file = self.cert_file.filter(|p| !not_found(p));
        }
        if !request.key_explicit {
            self.key_file = self.key_file.filter(|p| !not_found(p));
        }
        self
    }
}

/// Only a definite "no such file" clears a default path; other metadata
/// errors keep it so loading reports them.
fn not_found(path: &Path) -> bool {
    matches!(std::fs::metadata(path), Err(e) if e.kind() == io::ErrorKind::NotFound)
}

/// A realized client TLS configuration.
#[derive(Clone)]
pub struct TrustConfig {
    client_config: Arc<ClientConfig>,
    insecure_skip_verify: bool,
    client_auth: bool,
}

impl TrustConfig {
    /// A connector for wrapping outbound TCP streams.
    pub fn connector(&self) -> TlsConnector {
        TlsConnector::from(Arc::clone(&self.client_config))
    }

    pub fn client_config(&self) -> Arc<ClientConfig> {
        Arc::clone(&self.client_config)
    }

    pub fn insecure_skip_verify(&self) -> bool {
        self.insecure_skip_verify
    }

    /// Whether a client certificate is presented to the server.
    pub fn has_client_auth(&self) -> bool {
        self.client_auth
    }
}

impl fmt::Debug for TrustConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrustConfig")
            .field("insecure_skip_verify", &self.insecure_skip_verify)
            .field("client_auth", &self.client_auth)
            .finish_non_exhaustive()
    }
}

/// Build the client trust configuration, or `None` when TLS is off.
pub fn build(request: &TlsRequest, options: TrustOptions) -> Result<Option<TrustConfig>, TlsError> {
    if !request.enabled() {
        return Ok(None);
    }
    let options = options.apply_request(request);
    debug!(
        cert = ?options.cert_file,
        key = ?options.key_file,
        ca = ?options.ca_file,
        insecure_skip_verify = options.insecure_skip_verify,
        "Building TLS client configuration"
    );
    client_config(&options).map(Some)
}

/// Realize `options` into a [`TrustConfig`].
pub fn client_config(options: &TrustOptions) -> Result<TrustConfig, TlsError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()
        .map_err(|e| TlsError::Config(format!("protocol versions: {e}")))?;

    let builder = if options.insecure_skip_verify {
        warn!("TLS server certificate verification is disabled");
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(SkipServerVerification { provider }))
    } else {
        builder.with_root_certificates(root_store(options.ca_file.as_deref())?)
    };

    let identity = client_identity(options.cert_file.as_deref(), options.key_file.as_deref())?;
    let client_auth = identity.is_some();
    let config = match identity {
        Some((certs, key)) => builder
            .with_client_auth_cert(certs, key)
            .map_err(|e| TlsError::Config(format!("client certificate: {e}")))?,
        None => builder.with_no_client_auth(),
    };

    Ok(TrustConfig {
        client_config: Arc::new(config),
        insecure_skip_verify: options.insecure_skip_verify,
        client_auth,
    })
}

fn read_file(path: &Path) -> Result<Zeroizing<Vec<u8>>, TlsError> {
    std::fs::read(path)
        .map(Zeroizing::new)
        .map_err(|source| TlsError::Read {
            path: path.to_path_buf(),
            source,
        })
}

fn root_store(ca_file: Option<&Path>) -> Result<RootCertStore, TlsError> {
    let Some(path) = ca_file else {
        return Ok(RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        });
    };

    let mut store = RootCertStore::empty();
    for cert in parse_certificates(path)? {
        store.add(cert).map_err(|e| TlsError::Certificate {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    }
    Ok(store)
}

fn client_identity(
    cert_file: Option<&Path>,
    key_file: Option<&Path>,
) -> Result<Option<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>)>, TlsError> {
    match (cert_file, key_file) {
        (None, None) => Ok(None),
        (Some(cert), Some(key)) => Ok(Some((parse_certificates(cert)?, parse_private_key(key)?))),
        (Some(cert), None) => {
            read_file(cert)?;
            Err(TlsError::IncompletePair {
                present: "certificate",
                missing: "key",
            })
        }
        (None, Some(key)) => {
            read_file(key)?;
            Err(TlsError::IncompletePair {
                present: "key",
                missing: "certificate",
            })
        }
    }
}

fn parse_certificates(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let pem = read_file(path)?;
    let certs = CertificateDer::pem_slice_iter(&pem)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| TlsError::Certificate {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    if certs.is_empty() {
        return Err(TlsError::Certificate {
            path: path.to_path_buf(),
            reason: "no certificates found".to_string(),
        });
    }
    Ok(certs)
}

fn parse_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsError> {
    let pem = read_file(path)?;
    PrivateKeyDer::from_pem_slice(&pem).map_err(|e| TlsError::PrivateKey {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Accepts any server certificate chain. Handshake signatures are still
/// checked so the peer must hold the key for the certificate it sent.
#[derive(Debug)]
struct SkipServerVerification {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for SkipServerVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
