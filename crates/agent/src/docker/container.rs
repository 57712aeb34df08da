//! Container domain: list, inspect, lifecycle, and raw log streaming.

use super::client::{not_found_or, DockerClient, RuntimeError};
use super::inventory::ContainerInfo;

use bollard::container::LogOutput;
use bollard::models::ContainerInspectResponse;
use bollard::query_parameters::{ListContainersOptionsBuilder, LogsOptions, RemoveContainerOptions};
use bytes::{BufMut, Bytes, BytesMut};
use futures_util::stream::{Stream, StreamExt};
use std::collections::HashMap;

/// Length of the engine's multiplexed log record header.
pub const LOG_HEADER_LENGTH: usize = 8;

/// Which containers a list query should return. Lists always include
/// stopped containers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerFilter {
    All,
    /// Exact name match.
    Name(String),
    /// Id (or id prefix) match.
    Id(String),
    /// `key` or `key=value` label match.
    Label(String),
}

impl ContainerFilter {
    /// The engine-side filter key and value. Names are anchored so the
    /// daemon's regex match becomes an exact one.
    fn as_query(&self) -> Option<(&'static str, String)> {
        match self {
            ContainerFilter::All => None,
            ContainerFilter::Name(name) => Some(("name", format!("^{}$", name))),
            ContainerFilter::Id(id) => Some(("id", id.clone())),
            ContainerFilter::Label(label) => Some(("label", label.clone())),
        }
    }
}

/// Result of inspecting one container.
#[derive(Debug, Clone)]
pub struct Inspection {
    pub id: String,
    /// Whether the container's output is TTY formatted (no log framing).
    pub tty: bool,
    /// The full inspect document as returned by the runtime.
    pub document: serde_json::Value,
}

impl From<ContainerInspectResponse> for Inspection {
    fn from(details: ContainerInspectResponse) -> Self {
        let tty = details.config
            .as_ref()
            .and_then(|c| c.tty)
            .unwrap_or(false);
        let document = serde_json::to_value(&details).unwrap_or(serde_json::Value::Null);

        Self {
            id: details.id.unwrap_or_default(),
            tty,
            document,
        }
    }
}

/// Options for a container log stream. stdout, stderr and timestamps are
/// always requested.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogOptions {
    pub follow: bool,  // tail -f mode
    pub tail: u32,     // Like "docker logs --tail 100"
}

impl DockerClient {
    pub async fn list_containers(
        &self,
        filter: &ContainerFilter,
    ) -> Result<Vec<ContainerInfo>, RuntimeError> {
        let query = filter.as_query();
        let mut filters: HashMap<&str, Vec<&str>> = HashMap::new();
        if let Some((key, value)) = query.as_ref() {
            filters.insert(*key, vec![value.as_str()]);
        }

        let options = ListContainersOptionsBuilder::default()
            .all(true)
            .filters(&filters)
            .build();

        let containers = self.client.list_containers(Some(options)).await?;
        Ok(containers.into_iter().map(|c| c.into()).collect())
    }

    pub async fn inspect_container(&self, id: &str) -> Result<Inspection, RuntimeError> {
        let details: ContainerInspectResponse = self.client
            .inspect_container(id, None)
            .await
            .map_err(|e| not_found_or(id, e))?;
        Ok(Inspection::from(details))
    }

    // ── Container Lifecycle ───────────────────────────────────────

    pub async fn start_container(&self, container_id: &str) -> Result<(), RuntimeError> {
        self.client
            .start_container(container_id, None)
            .await
            .map_err(|e| not_found_or(container_id, e))
    }

    pub async fn stop_container(&self, container_id: &str) -> Result<(), RuntimeError> {
        self.client
            .stop_container(container_id, None)
            .await
            .map_err(|e| not_found_or(container_id, e))
    }

    pub async fn restart_container(&self, container_id: &str) -> Result<(), RuntimeError> {
        self.client
            .restart_container(container_id, None)
            .await
            .map_err(|e| not_found_or(container_id, e))
    }

    /// Remove a container. If `force` is true, the container will be killed first.
    pub async fn remove_container(&self, container_id: &str, force: bool) -> Result<(), RuntimeError> {
        let options = Some(RemoveContainerOptions {
            force,
            ..Default::default()
        });

        self.client
            .remove_container(container_id, options)
            .await
            .map_err(|e| not_found_or(container_id, e))
    }

    /// Raw log bytes of a container, in the engine's wire shape: framed
    /// records for non-TTY containers, plain text for TTY containers.
    pub fn container_log_bytes<'a>(
        &'a self,
        container_id: &'a str,
        options: LogOptions,
    ) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Send + 'a {
        let options = LogsOptions {
            follow: options.follow,
            stdout: true,
            stderr: true,
            timestamps: true,
            tail: options.tail.to_string(),
            ..Default::default()
        };

        self.client
            .logs(container_id, Some(options))
            .map(|result| match result {
                Ok(output) => Ok(encode_log_output(output)),
                Err(e) => Err(std::io::Error::other(e)),
            })
    }
}

/// Converts Bollard's `LogOutput` back into the bytes the engine sent.
///
/// bollard strips the 8-byte record header of multiplexed streams; it is
/// rebuilt here (stream id in byte 0, big-endian payload length in bytes
/// 4..8) so the log decoder sees exactly one wire shape per container.
pub(crate) fn encode_log_output(output: LogOutput) -> Bytes {
    let (stream_id, message) = match output {
        LogOutput::StdIn { message } => (0u8, message),
        LogOutput::StdOut { message } => (1u8, message),
        LogOutput::StdErr { message } => (2u8, message),
        LogOutput::Console { message } => return message,
    };

    let mut frame = BytesMut::with_capacity(LOG_HEADER_LENGTH + message.len());
    frame.put_u8(stream_id);
    frame.put_bytes(0, 3);
    frame.put_u32(message.len() as u32);
    frame.put_slice(&message);
    frame.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_stdout_frame() {
        let frame = encode_log_output(LogOutput::StdOut {
            message: Bytes::from("hello"),
        });
        assert_eq!(&frame[..LOG_HEADER_LENGTH], &[1, 0, 0, 0, 0, 0, 0, 5]);
        assert_eq!(&frame[LOG_HEADER_LENGTH..], b"hello");
    }

    #[test]
    fn test_encode_stderr_frame() {
        let frame = encode_log_output(LogOutput::StdErr {
            message: Bytes::from("ERROR: boom\n"),
        });
        assert_eq!(frame[0], 2);
        assert_eq!(u32::from_be_bytes([frame[4], frame[5], frame[6], frame[7]]), 12);
    }

    #[test]
    fn test_console_output_passes_through() {
        let frame = encode_log_output(LogOutput::Console {
            message: Bytes::from("tty line\n"),
        });
        assert_eq!(frame, Bytes::from("tty line\n"));
    }

    #[test]
    fn test_name_filter_is_anchored() {
        let filter = ContainerFilter::Name("web-1".into());
        assert_eq!(filter.as_query(), Some(("name", "^web-1$".to_string())));
        assert_eq!(ContainerFilter::All.as_query(), None);
    }
}
