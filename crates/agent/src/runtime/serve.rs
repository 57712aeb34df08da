//! Serve: dial the orchestrator and run the control channel until
//! shutdown or rejection.

use std::sync::Arc;
use tracing::{error, info};

use crate::channel::{dial, ClientLoop, ConnectionError, GrpcControlClient, LoopExit, RetryPolicy, SessionContext};
use crate::conf::ConnectionParams;
use crate::runtime::stop::shutdown_signal;
use crate::state::SharedState;

pub async fn serve(state: SharedState, params: ConnectionParams) -> Result<(), Box<dyn std::error::Error>> {
    info!("Spinning up gRPC agent client");

    tokio::spawn(shutdown_signal(state.shutdown.clone()));

    let channel = match dial::connect(&params.address, &state.config, &state.shutdown).await {
        Ok(channel) => channel,
        Err(ConnectionError::Cancelled) => {
            info!("Shutdown before the orchestrator came up");
            return Ok(());
        }
        Err(e) => {
            error!("Failed to dial orchestrator: {}", e);
            return Err(e.into());
        }
    };
    let control = GrpcControlClient::new(channel, &params.token)?;

    let ctx = SessionContext {
        state: Arc::clone(&state),
        control: Arc::new(control),
    };
    let policy = RetryPolicy::from_config(&state.config);

    match ClientLoop::new(ctx, params.node_id, policy).run().await {
        LoopExit::Shutdown => {
            info!("Agent shutdown complete");
            Ok(())
        }
        LoopExit::Rejected(status) => Err(ConnectionError::Rejected(status).into()),
    }
}
