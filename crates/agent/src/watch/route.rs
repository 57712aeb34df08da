//! Route: container state watch session.

use tracing::{debug, error, trace};

use super::reconcile::{watch_containers, WatchContext};
use super::WatchError;
use crate::channel::{SessionContext, SessionError, SubStream};
use crate::proto::{ContainerStateListMessage, ContainerStateRequest};

/// Streams state batches until the orchestrator closes the sub-stream,
/// the reconciler fails, or the first batch went out on a one-shot watch.
pub async fn watch_session(ctx: SessionContext, request: ContainerStateRequest) -> Result<(), SessionError> {
    let one_shot = request.one_shot.unwrap_or(false);
    debug!(one_shot, "Watching container state");

    let control = ctx.control.clone();
    let stream = SubStream::open(&ctx.state.shutdown, |rx| control.container_state(rx));

    let mut watch = match watch_containers(ctx.state.runtime.clone(), stream.token().clone()).await {
        Ok(watch) => watch,
        Err(WatchError::Cancelled) => {
            trace!("Container watch closed before the snapshot");
            return Ok(());
        }
        Err(e) => {
            drop(stream);
            return Err(e.into());
        }
    };

    let relayed = relay(&mut watch, &stream, one_shot).await;

    // Stops the reconciler even when the orchestrator keeps its side open.
    stream.token().cancel();
    stream.finish().await?;
    trace!("Container watch exited");
    relayed
}

async fn relay(
    watch: &mut WatchContext,
    stream: &SubStream<ContainerStateListMessage>,
    one_shot: bool,
) -> Result<(), SessionError> {
    loop {
        tokio::select! {
            biased;

            _ = stream.token().cancelled() => {
                trace!("Container watch closed");
                return Ok(());
            }
            batch = watch.events.recv() => match batch {
                Some(data) => {
                    trace!(items = data.len(), "Sending container state");
                    if let Err(e) = stream.send(ContainerStateListMessage { data }).await {
                        error!(error = %e, "Container state channel error");
                        return Ok(());
                    }
                    if one_shot {
                        return Ok(());
                    }
                }
                None => {
                    return match watch.error.recv().await {
                        Some(e) => Err(e.into()),
                        None => Ok(()),
                    };
                }
            },
            Some(e) = watch.error.recv() => return Err(e.into()),
        }
    }
}
