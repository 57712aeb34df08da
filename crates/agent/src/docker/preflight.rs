//! Preflight: runtime reachability and server version checks run at boot.

use super::client::{DockerClient, RuntimeError};
use super::container::ContainerFilter;
use std::fmt;
use tracing::{info, warn};

/// `major.minor.patch`
pub type Version = (u64, u64, u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerRuntime {
    Docker,
    Podman,
    Unknown(String),
}

impl ContainerRuntime {
    /// Docker ships `docker-init` as its init binary, Podman reports none.
    pub fn from_init_binary(init_binary: &str) -> Self {
        match init_binary {
            "docker-init" => ContainerRuntime::Docker,
            "" => ContainerRuntime::Podman,
            other => ContainerRuntime::Unknown(other.to_string()),
        }
    }

    /// `(minimum, recommended)` server versions.
    fn requirements(&self) -> Option<(Version, Version)> {
        match self {
            ContainerRuntime::Docker => Some(((20, 10, 0), (23, 0, 0))),
            ContainerRuntime::Podman => Some(((4, 0, 0), (4, 4, 0))),
            ContainerRuntime::Unknown(_) => None,
        }
    }
}

impl fmt::Display for ContainerRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerRuntime::Docker => write!(f, "Docker"),
            ContainerRuntime::Podman => write!(f, "Podman"),
            ContainerRuntime::Unknown(init) => write!(f, "unknown ({})", init),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionVerdict {
    Supported,
    /// Works, but an update is recommended.
    Outdated,
}

/// Parses `24.0.7`, `20.10.21-ce`, `4.9` and similar into a numeric triple.
/// Missing minor/patch components count as zero.
pub fn parse_version(raw: &str) -> Option<Version> {
    let core = raw
        .trim()
        .trim_start_matches('v')
        .split(['-', '+'])
        .next()?;

    let mut parts = core.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = match parts.next() {
        Some(p) => p.parse().ok()?,
        None => 0,
    };
    let patch = match parts.next() {
        Some(p) => p.parse().ok()?,
        None => 0,
    };
    Some((major, minor, patch))
}

fn format_version(v: Version) -> String {
    format!("{}.{}.{}", v.0, v.1, v.2)
}

pub fn check_version(runtime: &ContainerRuntime, raw: &str) -> Result<VersionVerdict, RuntimeError> {
    let (minimum, recommended) = runtime
        .requirements()
        .ok_or_else(|| RuntimeError::UnsupportedRuntime(runtime.to_string()))?;
    let version = parse_version(raw).ok_or_else(|| RuntimeError::InvalidVersion(raw.to_string()))?;

    if version < minimum {
        return Err(RuntimeError::UnsupportedVersion {
            runtime: runtime.to_string(),
            version: raw.to_string(),
            minimum: format_version(minimum),
        });
    }
    if version < recommended {
        return Ok(VersionVerdict::Outdated);
    }
    Ok(VersionVerdict::Supported)
}

impl DockerClient {
    pub async fn detect_runtime(&self) -> Result<ContainerRuntime, RuntimeError> {
        let info = self.client.info().await?;
        Ok(ContainerRuntime::from_init_binary(
            info.init_binary.as_deref().unwrap_or_default(),
        ))
    }

    pub async fn server_version(&self) -> Result<String, RuntimeError> {
        let version = self.client.version().await?;
        Ok(version.version.unwrap_or_default())
    }

    /// The runtime must answer a full container listing and report a
    /// supported server version. An outdated but supported version only warns.
    pub async fn preflight_checks(&self) -> Result<(), RuntimeError> {
        self.list_containers(&ContainerFilter::All).await?;

        let runtime = self.detect_runtime().await?;
        let version = self.server_version().await?;

        match check_version(&runtime, &version)? {
            VersionVerdict::Supported => {
                info!(runtime = %runtime, version = %version, "Container runtime detected");
            }
            VersionVerdict::Outdated => {
                warn!(
                    runtime = %runtime,
                    version = %version,
                    "Server version is outdated, please consider updating"
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version("24.0.7"), Some((24, 0, 7)));
        assert_eq!(parse_version("20.10.21-ce"), Some((20, 10, 21)));
        assert_eq!(parse_version("4.9"), Some((4, 9, 0)));
        assert_eq!(parse_version("v5.0.1+dev"), Some((5, 0, 1)));
        assert_eq!(parse_version("garbage"), None);
        assert_eq!(parse_version(""), None);
    }

    #[test]
    fn test_runtime_from_init_binary() {
        assert_eq!(ContainerRuntime::from_init_binary("docker-init"), ContainerRuntime::Docker);
        assert_eq!(ContainerRuntime::from_init_binary(""), ContainerRuntime::Podman);
        assert_eq!(
            ContainerRuntime::from_init_binary("tini"),
            ContainerRuntime::Unknown("tini".to_string())
        );
    }

    #[test]
    fn test_docker_version_thresholds() {
        let docker = ContainerRuntime::Docker;
        assert_eq!(check_version(&docker, "24.0.7").unwrap(), VersionVerdict::Supported);
        assert_eq!(check_version(&docker, "23.0.0").unwrap(), VersionVerdict::Supported);
        assert_eq!(check_version(&docker, "20.10.0").unwrap(), VersionVerdict::Outdated);
        assert!(matches!(
            check_version(&docker, "19.03.15"),
            Err(RuntimeError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn test_podman_version_thresholds() {
        let podman = ContainerRuntime::Podman;
        assert_eq!(check_version(&podman, "4.4.0").unwrap(), VersionVerdict::Supported);
        assert_eq!(check_version(&podman, "4.3.1").unwrap(), VersionVerdict::Outdated);
        assert!(check_version(&podman, "3.4.4").is_err());
    }

    #[test]
    fn test_unknown_runtime_and_bad_version() {
        let unknown = ContainerRuntime::Unknown("tini".into());
        assert!(matches!(
            check_version(&unknown, "1.0.0"),
            Err(RuntimeError::UnsupportedRuntime(_))
        ));
        assert!(matches!(
            check_version(&ContainerRuntime::Docker, "latest"),
            Err(RuntimeError::InvalidVersion(_))
        ));
    }
}
