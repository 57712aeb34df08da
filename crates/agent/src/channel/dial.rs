//! Dial: builds the single transport channel to the orchestrator.
//!
//! HTTPS targets go through the certificate bootstrap first. The real
//! channel then runs its own TLS leg that only accepts the leaf seen at
//! bootstrap. The dial keeps retrying until the orchestrator answers.

use std::fmt::Display;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use hyper_util::rt::TokioIo;
use rustls::pki_types::{CertificateDer, ServerName};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tokio_util::sync::CancellationToken;
use tonic::codegen::http::Uri;
use tonic::transport::{Channel, Endpoint};
use tower::Service;
use tracing::{info, warn};

use super::cert::{fetch_peer_certificates, pinned_config};
use super::error::ConnectionError;
use crate::conf::AgentConfig;

/// Parsed orchestrator address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialTarget {
    pub uri: Uri,
    pub host: String,
    pub port: u16,
    pub secure: bool,
}

/// Addresses without a scheme are treated as `https://`.
pub fn normalize_address(address: &str) -> Result<DialTarget, ConnectionError> {
    let address = address.trim();
    let address = if address.starts_with("http") {
        address.to_string()
    } else {
        format!("https://{}", address)
    };

    let invalid = || ConnectionError::InvalidAddress(address.clone());
    let uri: Uri = address.parse().map_err(|_| invalid())?;

    let secure = match uri.scheme_str() {
        Some("https") => true,
        Some("http") => false,
        _ => return Err(invalid()),
    };
    let host = uri
        .host()
        .map(|h| h.trim_start_matches('[').trim_end_matches(']'))
        .filter(|h| !h.is_empty())
        .ok_or_else(invalid)?
        .to_string();
    let port = uri.port_u16().unwrap_or(if secure { 443 } else { 80 });

    Ok(DialTarget {
        uri,
        host,
        port,
        secure,
    })
}

/// TLS leg of the channel, pinned to one leaf certificate.
#[derive(Clone)]
pub struct PinnedConnector {
    tls: TlsConnector,
    server_name: ServerName<'static>,
    host: String,
    port: u16,
}

impl PinnedConnector {
    pub fn new(target: &DialTarget, leaf: CertificateDer<'static>) -> Result<Self, ConnectionError> {
        let server_name = ServerName::try_from(target.host.clone())
            .map_err(|_| ConnectionError::InvalidAddress(target.host.clone()))?;
        Ok(Self {
            tls: TlsConnector::from(Arc::new(pinned_config(leaf)?)),
            server_name,
            host: target.host.clone(),
            port: target.port,
        })
    }

    /// Fetches the orchestrator's chain and pins its leaf.
    pub async fn bootstrap(target: &DialTarget) -> Result<Self, ConnectionError> {
        let leaf = fetch_peer_certificates(&target.host, target.port)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ConnectionError::NoPeerCertificates(target.host.clone()))?;
        Self::new(target, leaf)
    }
}

impl Service<Uri> for PinnedConnector {
    type Response = TokioIo<TlsStream<TcpStream>>;
    type Error = io::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    // The request uri carries the plain-http form; the target is fixed.
    fn call(&mut self, _uri: Uri) -> Self::Future {
        let this = self.clone();
        Box::pin(async move {
            let tcp = TcpStream::connect((this.host.as_str(), this.port)).await?;
            tcp.set_nodelay(true)?;
            let tls = this.tls.connect(this.server_name, tcp).await?;
            Ok(TokioIo::new(tls))
        })
    }
}

fn endpoint(target: &DialTarget, config: &AgentConfig) -> Result<Endpoint, ConnectionError> {
    let endpoint = if target.secure {
        // TLS is done by the pinned connector, so tonic must see plain
        // http. Requests still carry the https origin.
        let authority = target
            .uri
            .authority()
            .map(|a| a.as_str().to_string())
            .unwrap_or_else(|| target.host.clone());
        Endpoint::from_shared(format!("http://{}", authority))?.origin(target.uri.clone())
    } else {
        Endpoint::from_shared(target.uri.to_string())?
    };

    Ok(endpoint
        .connect_timeout(config.grpc_timeout())
        .http2_keep_alive_interval(config.grpc_keepalive())
        .keep_alive_timeout(config.grpc_timeout())
        .keep_alive_while_idle(true))
}

/// Repeats `attempt` with a fixed pause until it succeeds. Only shutdown
/// ends the wait early.
async fn wait_until_ready<T, E, F, Fut>(
    mut attempt: F,
    retry: Duration,
    shutdown: &CancellationToken,
) -> Result<T, ConnectionError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    loop {
        let outcome = tokio::select! {
            _ = shutdown.cancelled() => return Err(ConnectionError::Cancelled),
            outcome = attempt() => outcome,
        };

        match outcome {
            Ok(ready) => return Ok(ready),
            Err(e) => warn!(error = %e, "Orchestrator not reachable, retrying"),
        }

        tokio::select! {
            _ = shutdown.cancelled() => return Err(ConnectionError::Cancelled),
            _ = tokio::time::sleep(retry) => {}
        }
    }
}

/// Dials the orchestrator and blocks until the channel is up. A bad
/// address or a failed certificate bootstrap is fatal.
pub async fn connect(
    address: &str,
    config: &AgentConfig,
    shutdown: &CancellationToken,
) -> Result<Channel, ConnectionError> {
    let target = normalize_address(address)?;
    let endpoint = endpoint(&target, config)?;

    let pinned = if target.secure {
        Some(PinnedConnector::bootstrap(&target).await?)
    } else {
        warn!("Using insecure connection");
        None
    };

    info!(address = %target.uri, "Dialing to address");
    wait_until_ready(
        || {
            let endpoint = endpoint.clone();
            let pinned = pinned.clone();
            async move {
                match pinned {
                    Some(connector) => endpoint.connect_with_connector(connector).await,
                    None => endpoint.connect().await,
                }
            }
        },
        config.stream_retry_interval(),
        shutdown,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::tls_fixture::{serve_plain, server_certificate, spawn_tls_listener};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::net::TcpListener;
    use tokio::time::Instant;

    fn fast_retry() -> AgentConfig {
        AgentConfig {
            stream_retry_interval_ms: 50,
            ..AgentConfig::default()
        }
    }

    #[test]
    fn test_bare_host_defaults_to_https() {
        let target = normalize_address("orchestrator.example.com").unwrap();
        assert!(target.secure);
        assert_eq!(target.host, "orchestrator.example.com");
        assert_eq!(target.port, 443);
    }

    #[test]
    fn test_explicit_http_keeps_port() {
        let target = normalize_address("http://10.0.0.5:5000").unwrap();
        assert!(!target.secure);
        assert_eq!(target.host, "10.0.0.5");
        assert_eq!(target.port, 5000);
    }

    #[test]
    fn test_http_defaults_to_port_80() {
        let target = normalize_address("http://lens.local").unwrap();
        assert_eq!(target.port, 80);
    }

    #[test]
    fn test_host_with_port_and_no_scheme() {
        let target = normalize_address("lens.local:5443").unwrap();
        assert!(target.secure);
        assert_eq!(target.port, 5443);
    }

    #[test]
    fn test_ipv6_host_loses_brackets() {
        let target = normalize_address("https://[::1]:5443").unwrap();
        assert_eq!(target.host, "::1");
        assert_eq!(target.port, 5443);
    }

    #[test]
    fn test_garbage_address_is_rejected() {
        assert!(matches!(
            normalize_address("https://"),
            Err(ConnectionError::InvalidAddress(_))
        ));
        assert!(matches!(
            normalize_address("httpx://lens.local"),
            Err(ConnectionError::InvalidAddress(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_retries_until_ready() {
        let attempts = AtomicUsize::new(0);
        let retry = Duration::from_secs(1);
        let start = Instant::now();

        let ready = wait_until_ready(
            || {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err("connection refused")
                    } else {
                        Ok(n)
                    }
                }
            },
            retry,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(ready, 2);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert!(Instant::now() - start >= retry * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_ends_wait() {
        let shutdown = CancellationToken::new();
        let waiting = tokio::spawn({
            let shutdown = shutdown.clone();
            async move {
                wait_until_ready(
                    || async { Err::<(), _>("connection refused") },
                    Duration::from_secs(1),
                    &shutdown,
                )
                .await
            }
        });

        tokio::time::sleep(Duration::from_secs(10)).await;
        shutdown.cancel();
        assert!(matches!(waiting.await.unwrap(), Err(ConnectionError::Cancelled)));
    }

    #[tokio::test]
    async fn test_insecure_dial_waits_for_late_orchestrator() {
        // Reserve a port, free it, and bring the orchestrator up later.
        let addr = TcpListener::bind("127.0.0.1:0").await.unwrap().local_addr().unwrap();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            serve_plain(TcpListener::bind(addr).await.unwrap()).await;
        });

        let start = Instant::now();
        let dialed = tokio::time::timeout(
            Duration::from_secs(10),
            connect(&format!("http://{}", addr), &fast_retry(), &CancellationToken::new()),
        )
        .await
        .unwrap();

        assert!(dialed.is_ok(), "{:?}", dialed.err());
        assert!(start.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_secure_dial_pins_self_signed_ca() {
        let addr = spawn_tls_listener().await;

        let dialed = tokio::time::timeout(
            Duration::from_secs(10),
            connect(&format!("https://{}", addr), &fast_retry(), &CancellationToken::new()),
        )
        .await
        .unwrap();

        assert!(dialed.is_ok(), "{:?}", dialed.err());
    }

    #[tokio::test]
    async fn test_pinned_connector_refuses_other_certificate() {
        let addr = spawn_tls_listener().await;
        let target = normalize_address(&format!("https://{}", addr)).unwrap();

        let mut pinned = PinnedConnector::new(&target, server_certificate()).unwrap();
        assert!(pinned.call(target.uri.clone()).await.is_ok());

        let stranger = CertificateDer::from(vec![0x30u8, 0x03, 0x02, 0x01, 0x01]);
        let mut pinned = PinnedConnector::new(&target, stranger).unwrap();
        assert!(pinned.call(target.uri.clone()).await.is_err());
    }

    #[tokio::test]
    async fn test_failed_bootstrap_is_fatal() {
        // Nothing listens on port 9, so the certificate fetch fails at once.
        let err = connect("https://127.0.0.1:9", &fast_retry(), &CancellationToken::new()).await;
        assert!(matches!(err, Err(ConnectionError::Io(_))));
    }
}
