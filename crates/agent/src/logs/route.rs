//! Route: container log session.

use tracing::{debug, error, trace};

use super::model::{LogContext, LogError, LogEvent};
use super::open::open_container_log;
use crate::channel::{SessionContext, SessionError, SubStream};
use crate::proto::{ContainerLogMessage, ContainerLogRequest};

/// Streams one container's logs to the orchestrator until the log ends,
/// the orchestrator closes the sub-stream, or a send fails.
pub async fn container_log_session(ctx: SessionContext, request: ContainerLogRequest) -> Result<(), SessionError> {
    let name = request.name.clone();
    debug!(name = %name, tail = request.tail, stream = request.streaming, "Getting container logs");

    let control = ctx.control.clone();
    let stream = SubStream::open(&ctx.state.shutdown, |rx| control.container_log(&name, rx));

    let mut log = match open_container_log(ctx.state.runtime.clone(), &request, stream.token().clone()).await {
        Ok(log) => log,
        Err(SessionError::Log(LogError::Cancelled)) => {
            trace!(name = %name, "Container log closed before it opened");
            return Ok(());
        }
        Err(e) => {
            // Close our side; the orchestrator sees an empty stream.
            drop(stream);
            return Err(e);
        }
    };

    relay(&mut log, &stream, &name).await;
    log.reader.close();

    stream.finish().await?;
    trace!(name = %name, "Container log exited");
    Ok(())
}

async fn relay(log: &mut LogContext, stream: &SubStream<ContainerLogMessage>, name: &str) {
    while let Some(event) = log.reader.next().await {
        match event {
            LogEvent::Error(e) if e.is_expected(log.following) => {
                trace!(name = %name, reason = %e, "Container log finished");
                return;
            }
            LogEvent::Error(e) => {
                error!(name = %name, error = %e, "Container log reader error");
                return;
            }
            LogEvent::Message(message) => {
                if log.echo {
                    debug!(name = %name, log = %message.trim_end(), "Container log");
                }

                if let Err(e) = stream.send(ContainerLogMessage { log: message }).await {
                    error!(name = %name, error = %e, "Container log channel error");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::fake::FakeControl;
    use crate::client::fake::{FakeContainer, FakeRuntime};
    use crate::conf::AgentConfig;
    use crate::state::AgentState;
    use std::sync::Arc;

    fn framed(payload: &str) -> Vec<u8> {
        let mut out = vec![1u8, 0, 0, 0];
        out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        out.extend_from_slice(payload.as_bytes());
        out
    }

    fn context(runtime: Arc<FakeRuntime>, control: Arc<FakeControl>) -> SessionContext {
        SessionContext {
            state: Arc::new(AgentState::new(runtime, AgentConfig::default())),
            control,
        }
    }

    fn request(name: &str) -> ContainerLogRequest {
        ContainerLogRequest {
            name: name.to_string(),
            streaming: false,
            tail: 10,
        }
    }

    #[tokio::test]
    async fn test_log_lines_are_relayed() {
        let runtime = Arc::new(FakeRuntime::new());
        let logs = [framed("first\n"), framed("second\n")].concat();
        runtime.add_container(FakeContainer::new("aaa", "web-1", "running").with_logs(false, logs));
        let control = Arc::new(FakeControl::new());

        container_log_session(context(runtime, control.clone()), request("web-1"))
            .await
            .unwrap();

        let frames = control.log_frames();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].0, "web-1");
        assert_eq!(frames[0].1.log, "first\n");
        assert_eq!(frames[1].1.log, "second\n");
    }

    #[tokio::test]
    async fn test_truncated_log_closes_stream_early() {
        let runtime = Arc::new(FakeRuntime::new());
        let mut logs = framed("kept\n");
        logs.extend_from_slice(&[1, 0, 0, 0, 0, 0, 0, 50]);
        logs.extend_from_slice(b"cut");
        runtime.add_container(FakeContainer::new("aaa", "web-1", "running").with_logs(false, logs));
        let control = Arc::new(FakeControl::new());

        container_log_session(context(runtime, control.clone()), request("web-1"))
            .await
            .unwrap();

        let frames = control.log_frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].1.log, "kept\n");
    }

    #[tokio::test]
    async fn test_orchestrator_close_ends_session() {
        let runtime = Arc::new(FakeRuntime::new());
        runtime.add_container(
            FakeContainer::new("aaa", "web-1", "running").with_logs(false, framed("line\n")),
        );
        let control = Arc::new(FakeControl::new());
        control.close_streams();

        let mut req = request("web-1");
        req.streaming = true;
        container_log_session(context(runtime, control.clone()), req)
            .await
            .unwrap();

        assert!(control.log_frames().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_container_fails_session() {
        let runtime = Arc::new(FakeRuntime::new());
        let control = Arc::new(FakeControl::new());

        let err = container_log_session(context(runtime, control.clone()), request("ghost")).await;
        assert!(matches!(err, Err(SessionError::ContainerNotFound(_))));
        assert!(control.log_frames().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_before_open_is_quiet() {
        let runtime = Arc::new(FakeRuntime::new());
        runtime.add_container(FakeContainer::new("aaa", "web-1", "running"));
        let control = Arc::new(FakeControl::new());
        let ctx = context(runtime.clone(), control.clone());
        ctx.state.shutdown.cancel();

        container_log_session(ctx, request("web-1")).await.unwrap();

        assert!(control.log_frames().is_empty());
        assert!(runtime.calls().is_empty());
    }
}
