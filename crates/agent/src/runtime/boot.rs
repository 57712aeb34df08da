//! Boot: logging init, config load, node identity, Docker connection,
//! preflight, state creation.

use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::conf::{AgentConfig, ConnectionParams};
use crate::docker::DockerClient;
use crate::state::{AgentState, SharedState};

/// Initialise the tracing / logging subsystem.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lens_agent=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Load config, decode the node token, connect to Docker and check it
/// is usable.
///
/// Returns `(SharedState, ConnectionParams)` on success.
pub async fn boot() -> Result<(SharedState, ConnectionParams), Box<dyn std::error::Error>> {
    info!(version = env!("CARGO_PKG_VERSION"), "Starting Lens Agent");

    let config = AgentConfig::load()?;
    config.validate().map_err(|e| {
        error!("Invalid configuration: {}", e);
        e
    })?;

    let params = ConnectionParams::from_token(&config.grpc_token).map_err(|e| {
        error!("Invalid node token: {}", e);
        e
    })?;
    info!(node_id = %params.node_id, address = %params.address, "Loaded node identity");

    info!(
        "Connecting to Docker daemon at: {}",
        if config.docker_socket.is_empty() {
            "default socket"
        } else {
            &config.docker_socket
        }
    );

    let docker_client = DockerClient::new(&config.docker_socket).map_err(|e| {
        error!("Failed to connect to Docker: {}", e);
        e
    })?;

    docker_client.preflight_checks().await.map_err(|e| {
        error!("Preflight checks failed: {}", e);
        e
    })?;
    info!("Successfully connected to Docker daemon");

    let state = Arc::new(AgentState::new(Arc::new(docker_client), config));
    Ok((state, params))
}
