//! Query: container lookups and runtime-state-aware operations built on
//! top of [`RuntimeOps`].

use std::path::Path;

use tracing::{debug, info};

use crate::client::docker::RuntimeOps;
use crate::docker::{ContainerFilter, ContainerInfo, RuntimeError};

/// Cgroup membership file read when hostname lookups fail.
pub const CGROUP_FILE: &str = "/proc/self/cgroup";

/// Ids are shortened to this many characters in user-facing messages.
const VISIBLE_ID_LIMIT: usize = 12;

fn short_id(id: &str) -> &str {
    id.get(..VISIBLE_ID_LIMIT).unwrap_or(id)
}

/// Zero matches is `None`, exactly one is `Some`, more is an error.
pub fn check_one_container(
    containers: Vec<ContainerInfo>,
    query: &str,
) -> Result<Option<ContainerInfo>, RuntimeError> {
    let mut containers = containers.into_iter();
    match (containers.next(), containers.next()) {
        (None, _) => Ok(None),
        (Some(only), None) => Ok(Some(only)),
        (Some(_), Some(_)) => Err(RuntimeError::AmbiguousMatch(query.to_string())),
    }
}

/// Exact name match.
pub async fn get_container_by_name(
    runtime: &dyn RuntimeOps,
    name: &str,
) -> Result<Option<ContainerInfo>, RuntimeError> {
    let filter = ContainerFilter::Name(name.to_string());
    let containers = runtime.list_containers(&filter).await?;
    check_one_container(containers, name)
}

pub async fn get_container_by_id(
    runtime: &dyn RuntimeOps,
    id: &str,
) -> Result<Option<ContainerInfo>, RuntimeError> {
    let filter = ContainerFilter::Id(id.to_string());
    let containers = runtime.list_containers(&filter).await?;
    check_one_container(containers, id)
}

/// Like [`get_container_by_name`], but a missing container is an error.
pub async fn require_container_by_name(
    runtime: &dyn RuntimeOps,
    name: &str,
) -> Result<ContainerInfo, RuntimeError> {
    get_container_by_name(runtime, name)
        .await?
        .ok_or_else(|| RuntimeError::ContainerNotFound(name.to_string()))
}

/// Stops a live container before removing it. Containers that are not
/// running are removed directly, any other state is refused.
pub async fn delete_container(runtime: &dyn RuntimeOps, container: &ContainerInfo) -> Result<(), RuntimeError> {
    let id = container.id.as_str();
    match container.state.as_str() {
        "running" | "paused" | "restarting" => {
            info!(id = %short_id(id), "Stopping container");
            runtime.stop_container(id).await?;
        }
        "exited" | "dead" | "created" => {}
        other => {
            return Err(RuntimeError::UnexpectedState {
                id: id.to_string(),
                state: other.to_string(),
            });
        }
    }

    info!(id = %short_id(id), "Removing container");
    runtime.remove_container(id, false).await
}

/// Extracts the container id from a cgroup membership file.
///
/// Recognizes the cgroup v1 `/docker/<id>` form and the systemd
/// `docker-<id>.scope` / `libpod-<id>.scope` forms.
pub fn parse_cgroup(content: &str) -> Option<String> {
    fn is_container_id(s: &str) -> bool {
        s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit())
    }

    for line in content.lines() {
        // hierarchy-ID:controller-list:cgroup-path
        let path = match line.splitn(3, ':').nth(2) {
            Some(path) => path,
            None => continue,
        };

        for segment in path.split('/').rev() {
            let candidate = segment
                .strip_suffix(".scope")
                .and_then(|s| s.strip_prefix("docker-").or_else(|| s.strip_prefix("libpod-")))
                .unwrap_or(segment);

            if is_container_id(candidate) {
                return Some(candidate.to_string());
            }
        }
    }
    None
}

/// Resolves the container this agent runs in: by hostname as a name,
/// then as an id, then by the cgroup file.
pub async fn get_own_container(
    runtime: &dyn RuntimeOps,
    hostname: &str,
    cgroup_file: &Path,
) -> Result<ContainerInfo, RuntimeError> {
    if !hostname.is_empty() {
        debug!(hostname = %hostname, "Getting self by hostname");

        if let Some(own) = get_container_by_name(runtime, hostname).await? {
            return Ok(own);
        }
        if let Some(own) = get_container_by_id(runtime, hostname).await? {
            return Ok(own);
        }
    }

    let content = tokio::fs::read_to_string(cgroup_file).await?;
    if let Some(id) = parse_cgroup(&content) {
        debug!(cgroup = %short_id(&id), "Getting self by cgroup");

        if let Some(own) = get_container_by_id(runtime, &id).await? {
            return Ok(own);
        }
    }

    Err(RuntimeError::UnknownContainer)
}

/// Resolves self from the process environment.
pub async fn get_own_container_from_env(runtime: &dyn RuntimeOps) -> Result<ContainerInfo, RuntimeError> {
    let hostname = std::env::var("HOSTNAME").unwrap_or_default();
    get_own_container(runtime, &hostname, Path::new(CGROUP_FILE)).await
}

/// Force-removes the agent's own container.
pub async fn remove_self(runtime: &dyn RuntimeOps) -> Result<(), RuntimeError> {
    info!("Removing self");
    let own = get_own_container_from_env(runtime).await?;
    runtime.remove_container(&own.id, true).await
}
