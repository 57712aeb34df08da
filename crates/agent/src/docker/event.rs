//! Event domain: Docker engine event streaming.

use super::client::{DockerClient, RuntimeError};
use bollard::models::EventMessage;
use futures_util::stream::StreamExt;
use std::collections::HashMap;

/// One raw engine event, flattened from bollard's optional-everything model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeEvent {
    pub kind: String,    // "container", "image", "network", ...
    pub action: String,  // "start", "die", "exec_start: sh", ...
    pub actor_id: String,
    pub attributes: HashMap<String, String>,
}

impl RuntimeEvent {
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(|v| v.as_str())
    }
}

impl From<EventMessage> for RuntimeEvent {
    fn from(msg: EventMessage) -> Self {
        let (actor_id, attributes) = match msg.actor {
            Some(actor) => (
                actor.id.unwrap_or_default(),
                actor.attributes.unwrap_or_default(),
            ),
            None => (String::new(), HashMap::new()),
        };

        Self {
            kind: msg.typ.map(|t| t.to_string()).unwrap_or_default(),
            action: msg.action.unwrap_or_default(),
            actor_id,
            attributes,
        }
    }
}

impl DockerClient {
    /// Stream every engine event. Filtering by type happens in the
    /// reconciler so that non-container noise is visible in debug logs.
    pub fn stream_events(
        &self,
    ) -> impl futures_util::Stream<Item = Result<RuntimeEvent, RuntimeError>> + Send + '_ {
        self.client
            .events(None::<bollard::query_parameters::EventsOptions>)
            .map(|r| r.map(RuntimeEvent::from).map_err(RuntimeError::from))
    }
}
