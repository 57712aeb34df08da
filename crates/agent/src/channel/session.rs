//! Session: the control channel reconnect loop.
//!
//! Opens the top-level command stream, hands every received command to
//! the dispatcher and reopens the stream whenever it breaks. Only an
//! auth-class rejection or shutdown ends the loop.

use std::time::Duration;

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tonic::{Code, Status};
use tracing::{error, info};

use super::dispatch::{Dispatcher, SessionContext};
use crate::conf::AgentConfig;
use crate::proto::AgentInfo;

/// Fixed pauses between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// After the stream failed to open.
    pub open_retry: Duration,
    /// After an established stream broke or ended.
    pub recv_retry: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            open_retry: config.stream_retry_interval(),
            recv_retry: config.grpc_timeout(),
        }
    }
}

#[derive(Debug)]
pub enum LoopExit {
    Shutdown,
    /// The orchestrator refused this node.
    Rejected(Status),
}

/// Statuses that retrying can never fix.
pub fn is_auth_failure(status: &Status) -> bool {
    matches!(
        status.code(),
        Code::Unauthenticated | Code::PermissionDenied | Code::NotFound
    )
}

pub struct ClientLoop {
    ctx: SessionContext,
    node_id: String,
    policy: RetryPolicy,
}

impl ClientLoop {
    pub fn new(ctx: SessionContext, node_id: String, policy: RetryPolicy) -> Self {
        Self { ctx, node_id, policy }
    }

    fn agent_info(&self) -> AgentInfo {
        AgentInfo {
            id: self.node_id.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    fn shutdown(&self) -> &CancellationToken {
        &self.ctx.state.shutdown
    }

    /// False when shutdown arrived during the pause.
    async fn pause(&self, delay: Duration) -> bool {
        tokio::select! {
            _ = self.shutdown().cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    pub async fn run(&self) -> LoopExit {
        let dispatcher = Dispatcher::new(self.ctx.clone());
        let health = &self.ctx.state.health;

        loop {
            let opened = tokio::select! {
                _ = self.shutdown().cancelled() => return LoopExit::Shutdown,
                opened = self.ctx.control.connect(self.agent_info()) => opened,
            };

            let mut commands = match opened {
                Ok(commands) => commands,
                Err(status) if is_auth_failure(&status) => {
                    error!(error = %status, "Invalid token");
                    return LoopExit::Rejected(status);
                }
                Err(status) => {
                    error!(error = %status, "Failed to open control stream");
                    if !self.pause(self.policy.open_retry).await {
                        return LoopExit::Shutdown;
                    }
                    continue;
                }
            };

            info!("Stream connection is up");
            health.set_healthy(true);

            loop {
                let next = tokio::select! {
                    _ = self.shutdown().cancelled() => {
                        health.set_healthy(false);
                        return LoopExit::Shutdown;
                    }
                    next = commands.next() => next,
                };

                match next {
                    Some(Ok(command)) => dispatcher.dispatch(command),
                    Some(Err(status)) if is_auth_failure(&status) => {
                        error!(error = %status, "Invalid token");
                        health.set_healthy(false);
                        return LoopExit::Rejected(status);
                    }
                    Some(Err(status)) => {
                        error!(error = %status, "Cannot receive stream");
                        break;
                    }
                    None => {
                        info!("End of stream");
                        break;
                    }
                }
            }

            health.set_healthy(false);
            if !self.pause(self.policy.recv_retry).await {
                return LoopExit::Shutdown;
            }
        }
    }
}
