use std::path::Path;

use serde::Deserialize;

/// Randomness beacon endpoint configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BeaconConfig {
    /// Base URL of a drand-style beacon.
    pub url: String,
    /// Retries before the behaviour gives up for this round.
    #[serde(default = "default_beacon_retries")]
    pub max_retries: u32,
}

fn default_beacon_retries() -> u32 {
    5
}

/// OpenAI-compatible completion endpoint configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionConfig {
    pub url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    pub model: String,
}

/// Top-level agent configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// How many agents the local simulation runs.
    #[serde(default = "default_agent_count")]
    pub agent_count: usize,
    /// Maximum queue items the keeper consumes per period.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Randomness beacon (None = deterministic local source).
    #[serde(default)]
    pub beacon: Option<BeaconConfig>,
    /// Completion endpoint (None = scripted echo client).
    #[serde(default)]
    pub completion: Option<CompletionConfig>,
}

fn default_agent_count() -> usize {
    3
}

fn default_batch_size() -> usize {
    8
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            agent_count: std::env::var("QUORUM_AGENT_COUNT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_agent_count),
            batch_size: std::env::var("QUORUM_BATCH_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_batch_size),
            beacon: Self::beacon_from_env(),
            completion: Self::completion_from_env(),
        }
    }
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

impl AgentConfig {
    /// Load from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    fn beacon_from_env() -> Option<BeaconConfig> {
        let url = std::env::var("QUORUM_BEACON_URL").ok()?;
        let max_retries = std::env::var("QUORUM_BEACON_RETRIES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_beacon_retries);
        Some(BeaconConfig { url, max_retries })
    }

    fn completion_from_env() -> Option<CompletionConfig> {
        let url = std::env::var("QUORUM_COMPLETION_URL").ok()?;
        let api_key = std::env::var("QUORUM_COMPLETION_API_KEY").ok();
        let model = std::env::var("QUORUM_COMPLETION_MODEL")
            .unwrap_or_else(|_| "gpt-3.5-turbo".into());
        Some(CompletionConfig {
            url,
            api_key,
            model,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_full_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
agent_count = 4
batch_size = 16

[beacon]
url = "https://drand.example/api"
max_retries = 2

[completion]
url = "http://localhost:8080/v1"
model = "local-model"
"#
        )
        .unwrap();

        let config = AgentConfig::load(file.path()).unwrap();
        assert_eq!(config.agent_count, 4);
        assert_eq!(config.batch_size, 16);
        assert_eq!(config.beacon.unwrap().max_retries, 2);
        let completion = config.completion.unwrap();
        assert_eq!(completion.model, "local-model");
        assert!(completion.api_key.is_none());
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "agent_count = 5").unwrap();

        let config = AgentConfig::load(file.path()).unwrap();
        assert_eq!(config.agent_count, 5);
        assert_eq!(config.batch_size, 8);
        assert!(config.beacon.is_none());
        assert!(config.completion.is_none());
    }

    #[test]
    fn test_malformed_config_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "agent_count = \"not a number\"").unwrap();

        let err = AgentConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
