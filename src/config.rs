//! Application configuration
//!
//! Loaded from the YAML file named on the command line. Credentials and the
//! bind address can be overridden from the environment.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const ENV_API_KEY: &str = "TURNTAKING_PROCESSOR_API_KEY";
const ENV_BIND: &str = "TURNTAKING_BIND";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid bind address {value:?}: {source}")]
    InvalidBind {
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub dialogue: DialogueConfig,
    pub processor: ProcessorConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Turn-taking behaviour
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DialogueConfig {
    /// Maximum number of history entries kept
    pub history_length: usize,
    /// Partial recognition fragments to accumulate before reacting
    pub response_generation_interval: usize,
    /// How long `respond` waits for a precomputed response before asking
    /// the processor itself
    pub precompute_wait_ms: u64,
    /// Upper bound on a single dialogue processor call
    pub processor_timeout_secs: u64,
    /// Text published as a system backchannel
    pub backchannel_text: String,
    pub user_id: String,
    /// Let the system open the conversation
    pub start_with_system_turn: bool,
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            history_length: 5,
            response_generation_interval: 3,
            precompute_wait_ms: 100,
            processor_timeout_secs: 30,
            backchannel_text: "mm-hm".to_string(),
            user_id: "user".to_string(),
            start_with_system_turn: true,
        }
    }
}

impl DialogueConfig {
    pub fn precompute_wait(&self) -> Duration {
        Duration::from_millis(self.precompute_wait_ms)
    }

    pub fn processor_timeout(&self) -> Duration {
        Duration::from_secs(self.processor_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessorConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub bind: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8000)),
        }
    }
}

impl AppConfig {
    /// Read, apply environment overrides, validate
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_yaml(&text)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(key) = lookup(ENV_API_KEY) {
            self.processor.api_key = Some(key);
        }
        if let Some(value) = lookup(ENV_BIND) {
            self.server.bind = value
                .parse()
                .map_err(|source| ConfigError::InvalidBind { value, source })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dialogue.history_length == 0 {
            return Err(ConfigError::Invalid(
                "dialogue.history_length must be at least 1".to_string(),
            ));
        }
        if self.dialogue.response_generation_interval == 0 {
            return Err(ConfigError::Invalid(
                "dialogue.response_generation_interval must be at least 1".to_string(),
            ));
        }
        if self.dialogue.processor_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "dialogue.processor_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.processor.base_url.is_empty() {
            return Err(ConfigError::Invalid(
                "processor.base_url must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r"
dialogue:
  history_length: 2
  response_generation_interval: 4
processor:
  base_url: http://127.0.0.1:8080
  api_key: from-file
";

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = AppConfig::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.dialogue.history_length, 2);
        assert_eq!(config.dialogue.response_generation_interval, 4);
        assert_eq!(config.dialogue.precompute_wait(), Duration::from_millis(100));
        assert_eq!(config.dialogue.user_id, "user");
        assert!(config.dialogue.start_with_system_turn);
        assert_eq!(config.server.bind.port(), 8000);
    }

    #[test]
    fn test_env_overrides_take_precedence() {
        let mut config = AppConfig::from_yaml(SAMPLE).unwrap();
        config
            .apply_overrides(|key| match key {
                ENV_API_KEY => Some("from-env".to_string()),
                ENV_BIND => Some("127.0.0.1:9100".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.processor.api_key.as_deref(), Some("from-env"));
        assert_eq!(config.server.bind.port(), 9100);
    }

    #[test]
    fn test_bad_bind_override_is_rejected() {
        let mut config = AppConfig::from_yaml(SAMPLE).unwrap();
        let err = config
            .apply_overrides(|key| (key == ENV_BIND).then(|| "nowhere".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBind { .. }));
    }

    #[test]
    fn test_zero_interval_is_invalid() {
        let config = AppConfig::from_yaml(
            "dialogue:\n  response_generation_interval: 0\nprocessor:\n  base_url: http://x\n",
        )
        .unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_processor_timeout_is_invalid() {
        let config = AppConfig::from_yaml(
            "dialogue:\n  processor_timeout_secs: 0\nprocessor:\n  base_url: http://x\n",
        )
        .unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("processor_timeout_secs"));
    }

    #[test]
    fn test_missing_processor_section_fails_to_parse() {
        let err = AppConfig::from_yaml("dialogue:\n  history_length: 3\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.processor.base_url, "http://127.0.0.1:8080");
    }

    #[test]
    fn test_load_missing_file() {
        let err = AppConfig::load(Path::new("/nonexistent/turntaking.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
