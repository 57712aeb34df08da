use thiserror::Error;

use crate::docker::RuntimeError;
use crate::logs::LogError;
use crate::watch::WatchError;

/// Failures while establishing or keeping the control channel.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Invalid orchestrator address: {0}")]
    InvalidAddress(String),

    #[error("TLS handshake with {0} did not complete")]
    HandshakeIncomplete(String),

    #[error("No peer certificates received from {0}")]
    NoPeerCertificates(String),

    #[error("TLS configuration error: {0}")]
    Tls(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("gRPC transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("Shutdown requested before the orchestrator answered")]
    Cancelled,

    #[error("Control stream rejected: {0}")]
    Rejected(tonic::Status),

    #[error("Invalid request metadata: {0}")]
    InvalidMetadata(String),
}

/// Failures inside a single command session. They end that session only.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("gRPC status error: {0}")]
    Status(#[from] tonic::Status),

    #[error(transparent)]
    Watch(#[from] WatchError),

    #[error(transparent)]
    Log(#[from] LogError),

    #[error("Container not found: {0}")]
    ContainerNotFound(String),

    #[error("Unknown container operation: {0}")]
    UnknownOperation(i32),
}
