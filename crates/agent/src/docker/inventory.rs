use bollard::models::ContainerSummary;

/// Port mapping information
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct PortMapping {
    pub private_port: u16,
    pub public_port: u16,  // 0 when the port is not published
}

/// Basic container information derived from Docker's list API.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ContainerInfo {
    pub id: String,         // Full container ID 64-char hash
    pub name: String,       // Without leading slash
    pub image: String,      // "nginx:1.25"
    pub command: String,
    pub state: String,      // "running", "paused", "exited"
    pub labels: std::collections::HashMap<String, String>,
    pub created_at: i64,    // Unix timestamp (seconds)
    pub ports: Vec<PortMapping>,
}

impl From<ContainerSummary> for ContainerInfo {
    fn from(s: ContainerSummary) -> Self {
        let ports = s.ports
            .unwrap_or_default()
            .into_iter()
            .map(|p| PortMapping {
                private_port: p.private_port,
                public_port: p.public_port.unwrap_or(0),
            })
            .collect();

        Self {
            id: s.id.unwrap_or_default(),
            name: s.names.as_deref()             // Turn Option<Vec> into Option<&[String]>
                .and_then(|n| n.first())         // Get first item
                .map(|n| n.trim_start_matches('/'))
                .unwrap_or_default()
                .to_string(),
            image: s.image.unwrap_or_default(),
            command: s.command.unwrap_or_default(),
            state: s.state
                .map(|s| s.to_string())
                .unwrap_or_default(),
            labels: s.labels.unwrap_or_default(),
            created_at: s.created.unwrap_or_default(),
            ports,
        }
    }
}
