//! Docker client: core struct, constructor, error types.
//!
//! Domain methods live in sibling modules (`container`, `event`,
//! `preflight`) which add `impl DockerClient` blocks.

use bollard::Docker;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Docker connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Container not found: {0}")]
    ContainerNotFound(String),
    #[error("More than one matching container: {0}")]
    AmbiguousMatch(String),
    #[error("Could not determine the state ({state}) of the container ({id}) for deletion")]
    UnexpectedState { id: String, state: String },
    #[error("Unknown container ID, maybe not running in a container")]
    UnknownContainer,
    #[error("Failed to read cgroup file: {0}")]
    Cgroup(#[from] std::io::Error),
    #[error("Container runtime is not supported: {0}")]
    UnsupportedRuntime(String),
    #[error("{runtime} server version {version} is not supported (minimum {minimum})")]
    UnsupportedVersion { runtime: String, version: String, minimum: String },
    #[error("Cannot parse server version: {0}")]
    InvalidVersion(String),
    #[error("Bollard error: {0}")]
    BollardError(#[from] bollard::errors::Error),
}

#[derive(Debug, Clone)]
pub struct DockerClient {
    /// The bollard Docker client.  `pub(super)` so that domain modules
    /// in sibling files can call bollard APIs directly.
    pub(super) client: Docker,
}

impl DockerClient {
    pub fn new(socket_path: &str) -> Result<Self, RuntimeError> {
        let connection = if socket_path.is_empty() {
            Docker::connect_with_defaults()
                .map_err(|e| RuntimeError::ConnectionFailed(e.to_string()))?
        } else {
            let clean_path = socket_path.trim_start_matches("unix://");
            Docker::connect_with_socket(clean_path, 120, &bollard::API_DEFAULT_VERSION)
                .map_err(|e| RuntimeError::ConnectionFailed(e.to_string()))?
        };

        Ok(DockerClient { client: connection })
    }
}

/// Map a bollard 404 to `ContainerNotFound`, keep everything else.
pub(super) fn not_found_or(id: &str, e: bollard::errors::Error) -> RuntimeError {
    match e {
        bollard::errors::Error::DockerResponseServerError { status_code: 404, .. } => {
            RuntimeError::ContainerNotFound(id.to_string())
        }
        other => RuntimeError::BollardError(other),
    }
}
