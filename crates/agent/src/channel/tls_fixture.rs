//! Local listeners for exercising the dial path against real sockets.

use std::net::SocketAddr;
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::ServerConfig;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

/// Self-signed with basicConstraints CA:TRUE, the way `openssl req -x509`
/// makes it by default.
const SERVER_CERT: &[u8] = include_bytes!("../../tests/fixtures/server.crt.der");
const SERVER_KEY: &[u8] = include_bytes!("../../tests/fixtures/server.key.der");

pub fn server_certificate() -> CertificateDer<'static> {
    CertificateDer::from(SERVER_CERT.to_vec())
}

fn server_config() -> Arc<ServerConfig> {
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(SERVER_KEY.to_vec()));
    let mut config = ServerConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(vec![server_certificate()], key)
        .unwrap();
    config.alpn_protocols = vec![b"h2".to_vec()];
    Arc::new(config)
}

/// Drains a connection until the peer hangs up.
async fn drain<S: tokio::io::AsyncRead + Unpin>(mut stream: S) {
    let mut buf = [0u8; 4096];
    while matches!(stream.read(&mut buf).await, Ok(n) if n > 0) {}
}

/// TLS listener presenting the fixture certificate. Accepted connections
/// stay open and silent.
pub async fn spawn_tls_listener() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let acceptor = TlsAcceptor::from(server_config());

    tokio::spawn(async move {
        while let Ok((tcp, _)) = listener.accept().await {
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                if let Ok(tls) = acceptor.accept(tcp).await {
                    drain(tls).await;
                }
            });
        }
    });
    addr
}

/// Plain TCP listener that hangs up on every connection.
pub async fn spawn_silent_listener() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((tcp, _)) = listener.accept().await {
            drop(tcp);
        }
    });
    addr
}

/// Accepts on an already bound listener and holds connections open.
pub async fn serve_plain(listener: TcpListener) {
    while let Ok((tcp, _)) = listener.accept().await {
        tokio::spawn(drain(tcp));
    }
}
