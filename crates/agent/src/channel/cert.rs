//! Cert: trust-on-first-connect certificate bootstrap.
//!
//! Before dialing gRPC over TLS the agent opens one throwaway TLS
//! connection to the orchestrator and accepts whatever chain it presents.
//! The real channel then pins the leaf seen there, so self-signed
//! certificates work whether or not they are marked as a CA.

use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider, WebPkiSupportedAlgorithms};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{CertificateError, ClientConfig, DigitallySignedStruct, SignatureScheme};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, info};

use super::error::ConnectionError;

/// Accepts any chain but still checks handshake signatures, so the peer
/// must hold the key for the certificate it presents.
#[derive(Debug)]
struct TrustOnFirstConnect {
    algorithms: WebPkiSupportedAlgorithms,
}

/// Accepts only the leaf recorded at bootstrap.
#[derive(Debug)]
struct PinnedLeaf {
    leaf: CertificateDer<'static>,
    algorithms: WebPkiSupportedAlgorithms,
}

impl ServerCertVerifier for TrustOnFirstConnect {
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
        verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}

impl ServerCertVerifier for PinnedLeaf {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        if end_entity.as_ref() == self.leaf.as_ref() {
            Ok(ServerCertVerified::assertion())
        } else {
            Err(rustls::Error::InvalidCertificate(CertificateError::ApplicationVerificationFailure))
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}

fn client_config(
    provider: CryptoProvider,
    verifier: Arc<dyn ServerCertVerifier>,
) -> Result<ClientConfig, ConnectionError> {
    let mut config = ClientConfig::builder_with_provider(Arc::new(provider))
        .with_safe_default_protocol_versions()
        .map_err(|e| ConnectionError::Tls(e.to_string()))?
        .dangerous()
        .with_custom_certificate_verifier(verifier)
        .with_no_client_auth();

    // gRPC servers commonly refuse anything but h2.
    config.alpn_protocols = vec![b"h2".to_vec()];
    Ok(config)
}

fn bootstrap_config() -> Result<ClientConfig, ConnectionError> {
    let provider = rustls::crypto::ring::default_provider();
    let verifier = TrustOnFirstConnect {
        algorithms: provider.signature_verification_algorithms,
    };
    client_config(provider, Arc::new(verifier))
}

/// Client config for the real channel: trusts `leaf` and nothing else.
pub fn pinned_config(leaf: CertificateDer<'static>) -> Result<ClientConfig, ConnectionError> {
    let provider = rustls::crypto::ring::default_provider();
    let verifier = PinnedLeaf {
        leaf,
        algorithms: provider.signature_verification_algorithms,
    };
    client_config(provider, Arc::new(verifier))
}

/// The chain a finished handshake left behind, leaf first.
fn presented_chain(
    host: &str,
    handshaking: bool,
    peer: Option<&[CertificateDer<'_>]>,
) -> Result<Vec<CertificateDer<'static>>, ConnectionError> {
    if handshaking {
        return Err(ConnectionError::HandshakeIncomplete(host.to_string()));
    }

    let certificates: Vec<CertificateDer<'static>> = peer
        .map(|chain| chain.iter().map(|c| c.clone().into_owned()).collect())
        .unwrap_or_default();

    if certificates.is_empty() {
        return Err(ConnectionError::NoPeerCertificates(host.to_string()));
    }
    Ok(certificates)
}

/// Completes one TLS handshake with `host:port` and returns the presented
/// chain, leaf first.
pub async fn fetch_peer_certificates(host: &str, port: u16) -> Result<Vec<CertificateDer<'static>>, ConnectionError> {
    info!(host, port, "Retrieving certificate");

    let server_name = ServerName::try_from(host.to_string())
        .map_err(|_| ConnectionError::InvalidAddress(host.to_string()))?;
    let connector = TlsConnector::from(Arc::new(bootstrap_config()?));

    let tcp = TcpStream::connect((host, port)).await?;
    let tls = connector.connect(server_name, tcp).await?;
    let (_, session) = tls.get_ref();

    let certificates = presented_chain(host, session.is_handshaking(), session.peer_certificates())?;
    debug!(count = certificates.len(), "Fetched peer certificates");
    Ok(certificates)
}
