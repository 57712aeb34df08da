//! Open: resolves the target container and starts the decoder task.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use super::decode::pump;
use super::model::{ContainerLogReader, LogContext, LogError};
use crate::channel::SessionError;
use crate::client::query;
use crate::client::RuntimeOps;
use crate::docker::LogOptions;
use crate::proto::ContainerLogRequest;

/// Id of the agent's own container, if it runs in one.
async fn own_container_id(runtime: &dyn RuntimeOps) -> Option<String> {
    match query::get_own_container_from_env(runtime).await {
        Ok(own) => Some(own.id),
        Err(e) => {
            warn!(error = %e, "Failed to get self container");
            None
        }
    }
}

/// The decoder task owns the runtime handle so the log stream can
/// outlive the caller.
fn spawn_log_reader(
    runtime: Arc<dyn RuntimeOps>,
    id: String,
    options: LogOptions,
    tty: bool,
    cancel: CancellationToken,
) -> ContainerLogReader {
    let (tx, rx) = mpsc::channel(1);
    let task = tokio::spawn(async move {
        let reader = runtime.container_logs(&id, options);
        pump(reader, tty, tx, cancel).await;
    });
    ContainerLogReader::new(rx, task.abort_handle())
}

/// What the log session needs to know about its container.
struct LogTarget {
    id: String,
    echo: bool,
    tty: bool,
}

async fn resolve_target(runtime: &dyn RuntimeOps, name: &str) -> Result<LogTarget, SessionError> {
    let own_id = own_container_id(runtime).await;

    let target = query::get_container_by_name(runtime, name)
        .await?
        .ok_or_else(|| SessionError::ContainerNotFound(name.to_string()))?;

    // Never echo the agent's own output back into its log.
    let echo = own_id.as_deref().is_some_and(|own| own != target.id);
    trace!(name, echo, "Container log echo");

    let inspection = runtime.inspect_container(&target.id).await?;
    Ok(LogTarget {
        id: target.id,
        echo,
        tty: inspection.tty,
    })
}

/// Resolves the container and starts its decoder. A cancelled session
/// yields `LogError::Cancelled` before any runtime work finishes.
pub async fn open_container_log(
    runtime: Arc<dyn RuntimeOps>,
    request: &ContainerLogRequest,
    cancel: CancellationToken,
) -> Result<LogContext, SessionError> {
    let target = tokio::select! {
        biased;

        _ = cancel.cancelled() => return Err(LogError::Cancelled.into()),
        target = resolve_target(runtime.as_ref(), &request.name) => target?,
    };

    let options = LogOptions {
        follow: request.streaming,
        tail: request.tail,
    };

    let reader = spawn_log_reader(runtime, target.id, options, target.tty, cancel);
    Ok(LogContext {
        reader,
        echo: target.echo,
        following: request.streaming,
    })
}
