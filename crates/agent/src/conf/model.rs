//! Model: AgentConfig.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Node token (JWT) issued by the orchestrator.
    pub grpc_token: String,
    pub grpc_timeout_secs: u64,
    pub grpc_keepalive_secs: u64,
    /// Wait before reopening a control stream that failed to open.
    pub stream_retry_interval_ms: u64,
    pub docker_socket: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            grpc_token: "".to_string(),
            grpc_timeout_secs: 5,
            grpc_keepalive_secs: 60,
            stream_retry_interval_ms: 1000,
            docker_socket: "".to_string(),
        }
    }
}

impl AgentConfig {
    pub fn grpc_timeout(&self) -> Duration {
        Duration::from_secs(self.grpc_timeout_secs)
    }

    pub fn grpc_keepalive(&self) -> Duration {
        Duration::from_secs(self.grpc_keepalive_secs)
    }

    pub fn stream_retry_interval(&self) -> Duration {
        Duration::from_millis(self.stream_retry_interval_ms)
    }
}
