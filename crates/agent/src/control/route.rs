//! Route: one-shot command sessions (lifecycle, delete, inspect, close).

use tracing::{debug, error, info};

use crate::channel::{SessionContext, SessionError};
use crate::client::query;
use crate::client::RuntimeOps;
use crate::proto::{
    CloseConnectionRequest, CloseReason, ContainerCommandRequest, ContainerDeleteRequest,
    ContainerInspectMessage, ContainerInspectRequest, ContainerOperation,
};

/// Starts, stops or restarts the named container.
pub async fn command_session(ctx: SessionContext, request: ContainerCommandRequest) -> Result<(), SessionError> {
    let operation = ContainerOperation::try_from(request.operation)
        .map_err(|_| SessionError::UnknownOperation(request.operation))?;
    info!(operation = operation.as_str_name(), name = %request.name, "Executing");

    let runtime = ctx.state.runtime.as_ref();
    let container = query::get_container_by_name(runtime, &request.name)
        .await?
        .ok_or_else(|| SessionError::ContainerNotFound(request.name.clone()))?;

    match operation {
        ContainerOperation::StartContainer => runtime.start_container(&container.id).await?,
        ContainerOperation::StopContainer => runtime.stop_container(&container.id).await?,
        ContainerOperation::RestartContainer => runtime.restart_container(&container.id).await?,
        ContainerOperation::Unspecified => return Err(SessionError::UnknownOperation(request.operation)),
    }

    Ok(())
}

/// Removes the named container. Deleting something already gone succeeds.
pub async fn delete_session(ctx: SessionContext, request: ContainerDeleteRequest) -> Result<(), SessionError> {
    info!(name = %request.name, "Deleting container");

    let runtime = ctx.state.runtime.as_ref();
    match query::get_container_by_name(runtime, &request.name).await? {
        Some(container) => Ok(query::delete_container(runtime, &container).await?),
        None => {
            debug!(name = %request.name, "Container already gone");
            Ok(())
        }
    }
}

async fn inspection_json(runtime: &dyn RuntimeOps, name: &str) -> Result<String, SessionError> {
    let container = query::require_container_by_name(runtime, name).await?;
    let inspection = runtime.inspect_container(&container.id).await?;
    Ok(inspection.document.to_string())
}

/// Always answers with exactly one message; a failed lookup sends an
/// empty document.
pub async fn inspect_session(ctx: SessionContext, request: ContainerInspectRequest) -> Result<(), SessionError> {
    info!(name = %request.name, "Getting container inspection");

    let inspection = match inspection_json(ctx.state.runtime.as_ref(), &request.name).await {
        Ok(json) => json,
        Err(e) => {
            error!(name = %request.name, error = %e, "Failed to inspect container");
            String::new()
        }
    };

    ctx.control
        .container_inspect(ContainerInspectMessage {
            name: request.name,
            inspection,
        })
        .await?;
    Ok(())
}

/// Orchestrator-initiated close.
pub async fn close_session(ctx: SessionContext, request: CloseConnectionRequest) -> Result<(), SessionError> {
    let reason = CloseReason::try_from(request.reason).unwrap_or(CloseReason::Unspecified);
    debug!(reason = reason.as_str_name(), "Connection remotely closed");

    match reason {
        CloseReason::SelfDestruct => query::remove_self(ctx.state.runtime.as_ref()).await?,
        CloseReason::Shutdown => {
            info!("Remote shutdown requested");
            ctx.state.shutdown.cancel();
        }
        CloseReason::Close | CloseReason::Unspecified => {}
    }

    Ok(())
}
