//! Agent state: AgentState struct, shared state type alias.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::client::RuntimeOps;
use crate::conf::AgentConfig;
use crate::health::ChannelHealth;

pub struct AgentState {
    pub runtime: Arc<dyn RuntimeOps>,
    pub config: AgentConfig,
    pub health: ChannelHealth,
    /// Cancelled on process shutdown. Session tokens are children of it.
    pub shutdown: CancellationToken,
}

impl AgentState {
    pub fn new(runtime: Arc<dyn RuntimeOps>, config: AgentConfig) -> Self {
        Self {
            runtime,
            config,
            health: ChannelHealth::new(),
            shutdown: CancellationToken::new(),
        }
    }
}

pub type SharedState = Arc<AgentState>;
