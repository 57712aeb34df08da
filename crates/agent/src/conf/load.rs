//! Load: config loading from file and environment variables.

use std::fs;
use std::path::Path;

use super::model::AgentConfig;

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

impl AgentConfig {
    /// Load configuration from file or environment variables
    /// Priority: Environment Variables > Config File > Defaults
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        // A missing .env is fine; a broken one is not.
        match dotenvy::dotenv() {
            Ok(path) => tracing::info!("Loaded environment from: {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => return Err(e.into()),
        }

        let config_path = std::env::var("AGENT_CONFIG_FILE")
            .unwrap_or_else(|_| "/etc/lens/agent.toml".to_string());

        let mut config = if Path::new(&config_path).exists() {
            tracing::info!("Loading configuration from: {}", config_path);
            Self::from_file(&config_path)?
        } else {
            tracing::info!("Config file not found at {}, using environment variables", config_path);
            Self::from_env()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)?;
        let config: AgentConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var("GRPC_TOKEN") {
            self.grpc_token = token;
        }
        if let Some(secs) = env_u64("GRPC_TIMEOUT") {
            self.grpc_timeout_secs = secs;
        }
        if let Some(secs) = env_u64("GRPC_KEEPALIVE") {
            self.grpc_keepalive_secs = secs;
        }
        if let Some(ms) = env_u64("GRPC_STREAM_RETRY_MS") {
            self.stream_retry_interval_ms = ms;
        }
        if let Ok(socket) = std::env::var("DOCKER_SOCKET") {
            self.docker_socket = socket;
        }
    }

    /// Validate configuration values are sane
    pub fn validate(&self) -> Result<(), String> {
        if self.grpc_token.trim().is_empty() {
            return Err("grpc_token must not be empty (set GRPC_TOKEN)".to_string());
        }
        if self.grpc_timeout_secs == 0 {
            return Err("grpc_timeout_secs must be > 0".to_string());
        }
        if self.grpc_keepalive_secs == 0 {
            return Err("grpc_keepalive_secs must be > 0".to_string());
        }
        if self.stream_retry_interval_ms == 0 {
            return Err("stream_retry_interval_ms must be > 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> AgentConfig {
        AgentConfig {
            grpc_token: "a.b.c".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_default_with_token_passes() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_token() {
        let err = AgentConfig::default().validate().unwrap_err();
        assert!(err.contains("grpc_token"), "Error should mention grpc_token: {}", err);
    }

    #[test]
    fn test_validate_rejects_zero_durations() {
        let cfg = AgentConfig { grpc_timeout_secs: 0, ..valid() };
        assert!(cfg.validate().unwrap_err().contains("grpc_timeout_secs"));

        let cfg = AgentConfig { grpc_keepalive_secs: 0, ..valid() };
        assert!(cfg.validate().unwrap_err().contains("grpc_keepalive_secs"));

        let cfg = AgentConfig { stream_retry_interval_ms: 0, ..valid() };
        assert!(cfg.validate().unwrap_err().contains("stream_retry_interval_ms"));
    }

    #[test]
    fn test_from_file_reads_toml() {
        let dir = std::env::temp_dir().join(format!("lens-agent-conf-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("agent.toml");
        std::fs::write(&path, "grpc_token = \"x.y.z\"\ngrpc_timeout_secs = 9\n").unwrap();

        let cfg = AgentConfig::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(cfg.grpc_token, "x.y.z");
        assert_eq!(cfg.grpc_timeout_secs, 9);
        assert_eq!(cfg.grpc_keepalive_secs, 60);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_from_file_rejects_bad_toml() {
        let dir = std::env::temp_dir().join(format!("lens-agent-badconf-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("agent.toml");
        std::fs::write(&path, "grpc_timeout_secs = \"soon\"\n").unwrap();

        assert!(AgentConfig::from_file(path.to_str().unwrap()).is_err());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
