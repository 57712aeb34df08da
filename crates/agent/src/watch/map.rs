//! Map: pure conversion helpers from runtime data to container state items.

use prost_types::Timestamp;

use crate::docker::{ContainerInfo, PortMapping};
use crate::proto::{ContainerState, ContainerStateItem, ContainerStateItemPort};

/// Container event actions the watch cares about. Everything else (exec,
/// tty, oom, attach, ...) is `Other` and produces no state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerAction {
    Create,
    Start,
    Restart,
    Stop,
    Die,
    Pause,
    Destroy,
    Other,
}

impl ContainerAction {
    pub fn parse(action: &str) -> Self {
        match action {
            "create" => ContainerAction::Create,
            "start" => ContainerAction::Start,
            "restart" => ContainerAction::Restart,
            "stop" => ContainerAction::Stop,
            "die" => ContainerAction::Die,
            "pause" => ContainerAction::Pause,
            "destroy" => ContainerAction::Destroy,
            _ => ContainerAction::Other,
        }
    }

    pub fn state(self) -> ContainerState {
        match self {
            ContainerAction::Create | ContainerAction::Pause => ContainerState::Waiting,
            ContainerAction::Start | ContainerAction::Restart => ContainerState::Running,
            ContainerAction::Stop | ContainerAction::Die => ContainerState::Exited,
            ContainerAction::Destroy => ContainerState::Removed,
            ContainerAction::Other => ContainerState::Unspecified,
        }
    }
}

/// Runtime state string as reported by the list API.
pub fn map_runtime_state(state: &str) -> ContainerState {
    match state {
        "created" | "restarting" | "removing" | "paused" => ContainerState::Waiting,
        "running" => ContainerState::Running,
        "exited" | "dead" => ContainerState::Exited,
        _ => ContainerState::Unspecified,
    }
}

/// `(name, tag)`. The tag follows the last `:` after the last `/`, so a
/// registry port is never mistaken for a tag.
pub fn split_image(image: &str) -> (String, String) {
    let name_start = image.rfind('/').map(|i| i + 1).unwrap_or(0);
    match image[name_start..].rfind(':') {
        Some(i) => {
            let split = name_start + i;
            (image[..split].to_string(), image[split + 1..].to_string())
        }
        None => (image.to_string(), "latest".to_string()),
    }
}

fn map_port(port: &PortMapping) -> ContainerStateItemPort {
    ContainerStateItemPort {
        internal: i32::from(port.private_port),
        external: i32::from(port.public_port),
    }
}

pub fn map_container_state(info: &ContainerInfo) -> ContainerStateItem {
    let (image_name, image_tag) = split_image(&info.image);

    ContainerStateItem {
        name: info.name.clone(),
        command: info.command.clone(),
        created_at: Some(Timestamp {
            seconds: info.created_at,
            nanos: 0,
        }),
        state: map_runtime_state(&info.state) as i32,
        reason: info.state.clone(),
        image_name,
        image_tag,
        ports: info.ports.iter().map(map_port).collect(),
    }
}

pub fn map_container_state_list(containers: &[ContainerInfo]) -> Vec<ContainerStateItem> {
    containers.iter().map(map_container_state).collect()
}

/// The item sent for a destroyed container: only the name is known.
pub fn removed_state_item(name: &str) -> ContainerStateItem {
    ContainerStateItem {
        name: name.to_string(),
        state: ContainerState::Removed as i32,
        ..Default::default()
    }
}
