//! Dispatch: one received command becomes one independent session task.

use std::future::Future;
use std::sync::Arc;

use tracing::{error, warn};

use super::client::ControlClient;
use super::error::SessionError;
use crate::control::route as control;
use crate::logs::route::container_log_session;
use crate::proto::agent_command::Command;
use crate::proto::AgentCommand;
use crate::state::SharedState;
use crate::watch::route::watch_session;

/// Everything a session handler needs.
#[derive(Clone)]
pub struct SessionContext {
    pub state: SharedState,
    pub control: Arc<dyn ControlClient>,
}

/// Runs sessions as detached tasks. A failing or panicking session is
/// logged by a supervisor task and never reaches the caller.
#[derive(Clone, Copy, Default)]
pub struct TaskSpawner;

impl TaskSpawner {
    pub fn spawn<F>(&self, session: &'static str, task: F)
    where
        F: Future<Output = Result<(), SessionError>> + Send + 'static,
    {
        let handle = tokio::spawn(task);
        tokio::spawn(async move {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(session, error = %e, "Session failed"),
                Err(e) if e.is_panic() => error!(session, "Session panicked"),
                Err(_) => {}
            }
        });
    }
}

pub struct Dispatcher {
    ctx: SessionContext,
    spawner: TaskSpawner,
}

impl Dispatcher {
    pub fn new(ctx: SessionContext) -> Self {
        Self {
            ctx,
            spawner: TaskSpawner,
        }
    }

    /// Starts the session for `command` and returns without waiting on it.
    pub fn dispatch(&self, command: AgentCommand) {
        let ctx = self.ctx.clone();
        match command.command {
            Some(Command::ContainerState(req)) => {
                self.spawner.spawn("watch", watch_session(ctx, req));
            }
            Some(Command::Close(req)) => {
                self.spawner.spawn("close", control::close_session(ctx, req));
            }
            Some(Command::ContainerCommand(req)) => {
                self.spawner.spawn("command", control::command_session(ctx, req));
            }
            Some(Command::ContainerDelete(req)) => {
                self.spawner.spawn("delete", control::delete_session(ctx, req));
            }
            Some(Command::ContainerLog(req)) => {
                self.spawner.spawn("log", container_log_session(ctx, req));
            }
            Some(Command::ContainerInspect(req)) => {
                self.spawner.spawn("inspect", control::inspect_session(ctx, req));
            }
            None => warn!("Unknown agent command"),
        }
    }
}
