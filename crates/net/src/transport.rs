//! QUIC transport layer using quinn for reliable, encrypted connections.
//!
//! Provides server and client endpoints with TLS encryption (self-signed
//! certs for development, system roots or an explicit PEM bundle otherwise).

use anyhow::{Context, Result};
use quinn::{ClientConfig, Endpoint, ServerConfig};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// ALPN protocol identifier for riftfall connections.
const ALPN: &[u8] = b"riftfall";

/// How the client validates the server certificate.
#[derive(Debug, Clone)]
pub enum TlsMode {
    /// Accept any certificate (development only).
    InsecureSkipVerify,
    /// Validate against the platform trust store.
    SystemRoots,
    /// Validate against an explicit PEM certificate bundle.
    CertFile(PathBuf),
}

impl TlsMode {
    /// Read the TLS mode from `RIFTFALL_TLS`.
    ///
    /// Accepts `insecure`, `system`, or a path to a PEM bundle. Defaults to
    /// system roots when unset.
    pub fn from_env() -> Self {
        match std::env::var("RIFTFALL_TLS") {
            Ok(value) if value == "insecure" => TlsMode::InsecureSkipVerify,
            Ok(value) if value == "system" => TlsMode::SystemRoots,
            Ok(path) if !path.is_empty() => TlsMode::CertFile(PathBuf::from(path)),
            _ => TlsMode::SystemRoots,
        }
    }
}

/// Server endpoint for accepting QUIC connections.
pub struct ServerEndpoint {
    endpoint: Endpoint,
    addr: SocketAddr,
}

impl ServerEndpoint {
    /// Create a new server endpoint bound to the given address.
    ///
    /// Uses self-signed TLS certificates for development.
    pub fn bind(addr: SocketAddr) -> Result<Self> {
        info!("Creating server endpoint on {}", addr);

        // Install default crypto provider if not already installed
        let _ = rustls::crypto::ring::default_provider().install_default();

        let (cert, key) = generate_self_signed_cert()?;

        let mut server_crypto = rustls::ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(vec![cert.clone()], key.clone_key())
            .context("Failed to build rustls ServerConfig")?;

        server_crypto.alpn_protocols = vec![ALPN.to_vec()];

        let mut server_config = ServerConfig::with_crypto(Arc::new(
            quinn::crypto::rustls::QuicServerConfig::try_from(server_crypto)
                .context("Failed to create QuicServerConfig")?,
        ));

        let mut transport_config = quinn::TransportConfig::default();
        transport_config.keep_alive_interval(Some(std::time::Duration::from_secs(5)));
        transport_config.max_idle_timeout(Some(std::time::Duration::from_secs(30).try_into()?));

        server_config.transport_config(Arc::new(transport_config));

        let endpoint =
            Endpoint::server(server_config, addr).context("Failed to bind server endpoint")?;

        let actual_addr = endpoint.local_addr()?;
        info!("Server endpoint bound to {}", actual_addr);

        Ok(Self {
            endpoint,
            addr: actual_addr,
        })
    }

    /// Get the local address this endpoint is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Accept an incoming connection.
    ///
    /// Returns None when the endpoint is closed.
    pub async fn accept(&self) -> Option<quinn::Incoming> {
        self.endpoint.accept().await
    }

    /// Close the endpoint, rejecting new connections.
    pub fn close(&self) {
        self.endpoint.close(0u32.into(), b"Server shutting down");
    }
}

/// Client endpoint for establishing QUIC connections.
pub struct ClientEndpoint {
    endpoint: Endpoint,
}

impl ClientEndpoint {
    /// Create a new client endpoint with the given TLS mode.
    pub fn new(tls: TlsMode) -> Result<Self> {
        debug!("Creating client endpoint with {:?}", tls);

        // Install default crypto provider if not already installed
        let _ = rustls::crypto::ring::default_provider().install_default();

        let mut client_crypto = match tls {
            TlsMode::InsecureSkipVerify => {
                warn!("TLS verification disabled; development use only");
                rustls::ClientConfig::builder()
                    .dangerous()
                    .with_custom_certificate_verifier(Arc::new(SkipServerVerification))
                    .with_no_client_auth()
            }
            TlsMode::SystemRoots => {
                let mut roots = rustls::RootCertStore::empty();
                let native = rustls_native_certs::load_native_certs();
                for cert in native.certs {
                    // Tolerate individual unparseable platform certs.
                    if let Err(err) = roots.add(cert) {
                        debug!("Skipping unusable system root: {}", err);
                    }
                }
                rustls::ClientConfig::builder()
                    .with_root_certificates(roots)
                    .with_no_client_auth()
            }
            TlsMode::CertFile(path) => {
                let pem = std::fs::read(&path)
                    .with_context(|| format!("Failed to read cert bundle {}", path.display()))?;
                let mut roots = rustls::RootCertStore::empty();
                for cert in rustls_pemfile::certs(&mut pem.as_slice()) {
                    roots.add(cert.context("Failed to parse certificate")?)?;
                }
                rustls::ClientConfig::builder()
                    .with_root_certificates(roots)
                    .with_no_client_auth()
            }
        };

        client_crypto.alpn_protocols = vec![ALPN.to_vec()];

        let client_config = ClientConfig::new(Arc::new(
            quinn::crypto::rustls::QuicClientConfig::try_from(client_crypto)
                .context("Failed to create QuicClientConfig")?,
        ));

        let mut endpoint = Endpoint::client("0.0.0.0:0".parse()?)?;
        endpoint.set_default_client_config(client_config);

        debug!("Client endpoint created on {}", endpoint.local_addr()?);

        Ok(Self { endpoint })
    }

    /// Connect to a server at the given address.
    ///
    /// Returns the established connection.
    pub async fn connect(&self, server_addr: SocketAddr) -> Result<quinn::Connection> {
        info!("Connecting to server at {}", server_addr);

        let connection = self
            .endpoint
            .connect(server_addr, "localhost")
            .context("Failed to initiate connection")?
            .await
            .context("Failed to establish connection")?;

        info!("Connected to server at {}", server_addr);

        Ok(connection)
    }

    /// Close the endpoint, terminating all connections.
    pub fn close(&self) {
        self.endpoint.close(0u32.into(), b"Client shutting down");
    }
}

/// Generate a self-signed certificate for development use.
///
/// **WARNING:** This is insecure and should only be used for development/testing.
fn generate_self_signed_cert() -> Result<(CertificateDer<'static>, PrivateKeyDer<'static>)> {
    debug!("Generating self-signed certificate");

    let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()])
        .context("Failed to generate certificate")?;

    let key = PrivateKeyDer::Pkcs8(cert.key_pair.serialize_der().into());
    let cert_der = CertificateDer::from(cert.cert);

    Ok((cert_der, key))
}

/// Certificate verifier that accepts all certificates (development only).
///
/// **WARNING:** This bypasses TLS security and should NEVER be used in production.
#[derive(Debug)]
struct SkipServerVerification;

impl rustls::client::danger::ServerCertVerifier for SkipServerVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        vec![
            rustls::SignatureScheme::RSA_PKCS1_SHA256,
            rustls::SignatureScheme::ECDSA_NISTP256_SHA256,
            rustls::SignatureScheme::ED25519,
        ]
    }
}
