//! Configuration types and loading
//!
//! All tunables live here and are loaded once at startup; the resulting
//! Config is passed into the components that need it. No module-level state.

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::{CapacityBand, CapacityCaps};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Pipeline circuit breakers and gate settings
    pub pipeline: PipelineConfig,

    /// Capacity bands for action planning
    pub capacity: CapacityConfig,

    /// Storage configuration
    pub storage: StorageConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Call early in startup to fail fast with a clear message.
    pub fn validate(&self) -> Result<()> {
        if std::env::var(&self.llm.api_key_env).is_err() {
            return Err(eyre::eyre!(
                "LLM API key not found. Set the {} environment variable.",
                self.llm.api_key_env
            ));
        }
        if self.pipeline.max_questions_per_round == 0 {
            return Err(eyre::eyre!("pipeline.max-questions-per-round must be at least 1"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let local_config = PathBuf::from(".interpipe.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("interpipe").join("interpipe.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name (currently only "anthropic" supported)
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Per-call timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            max_tokens: 8192,
            timeout_ms: 120_000,
        }
    }
}

/// Pipeline circuit breakers and quality-gate settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Hard cap on clarifying questions across the whole session
    #[serde(rename = "max-questions-total")]
    pub max_questions_total: u32,

    /// Hard cap on questions delivered in one round
    #[serde(rename = "max-questions-per-round")]
    pub max_questions_per_round: u32,

    /// Hard cap on question rounds
    #[serde(rename = "max-rounds")]
    pub max_rounds: u32,

    /// Collaborator timeout in milliseconds
    #[serde(rename = "collaborator-timeout-ms")]
    pub collaborator_timeout_ms: u64,

    /// Phrases the final report must never contain (case-insensitive)
    #[serde(rename = "forbidden-phrases")]
    pub forbidden_phrases: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_questions_total: 5,
            max_questions_per_round: 3,
            max_rounds: 3,
            collaborator_timeout_ms: 120_000,
            forbidden_phrases: vec![
                "as an ai".to_string(),
                "i cannot".to_string(),
                "insufficient data to".to_string(),
            ],
        }
    }
}

/// Per-band cumulative caps
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CapacityConfig {
    /// Band assumed when the caller states none
    #[serde(rename = "default-band")]
    pub default_band: CapacityBand,

    pub low: CapacityCaps,
    pub medium: CapacityCaps,
    pub high: CapacityCaps,
}

impl CapacityConfig {
    /// Caps for a band, forced monotone
    pub fn caps_for(&self, band: CapacityBand) -> CapacityCaps {
        match band {
            CapacityBand::Low => self.low,
            CapacityBand::Medium => self.medium,
            CapacityBand::High => self.high,
        }
        .normalized()
    }
}

impl Default for CapacityConfig {
    fn default() -> Self {
        Self {
            default_band: CapacityBand::Medium,
            low: CapacityCaps::new(2, 4, 6),
            medium: CapacityCaps::new(3, 6, 9),
            high: CapacityCaps::new(4, 8, 12),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for the session store
    #[serde(rename = "store-dir")]
    pub store_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let store_dir = dirs::data_dir()
            .map(|d| d.join("interpipe"))
            .unwrap_or_else(|| PathBuf::from(".sessionstore"))
            .to_string_lossy()
            .into_owned();
        Self { store_dir }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.llm.provider, "anthropic");
        assert_eq!(config.pipeline.max_questions_total, 5);
        assert_eq!(config.pipeline.max_questions_per_round, 3);
        assert_eq!(config.pipeline.max_rounds, 3);
        assert_eq!(config.capacity.default_band, CapacityBand::Medium);
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
llm:
  model: claude-opus-4
  api-key-env: MY_API_KEY
  timeout-ms: 60000

pipeline:
  max-questions-total: 8
  max-questions-per-round: 2
  max-rounds: 4

capacity:
  default-band: low
  low:
    "6m": 1
    "12m": 2
    "24m": 3
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.llm.model, "claude-opus-4");
        assert_eq!(config.llm.api_key_env, "MY_API_KEY");
        assert_eq!(config.pipeline.max_questions_total, 8);
        assert_eq!(config.pipeline.max_rounds, 4);
        assert_eq!(config.capacity.default_band, CapacityBand::Low);
        assert_eq!(config.capacity.low, CapacityCaps::new(1, 2, 3));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let yaml = r#"
pipeline:
  max-rounds: 2
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.pipeline.max_rounds, 2);
        assert_eq!(config.pipeline.max_questions_total, 5);
        assert_eq!(config.llm.provider, "anthropic");
    }

    #[test]
    fn test_caps_for_is_monotone() {
        let mut config = CapacityConfig::default();
        config.low = CapacityCaps::new(4, 2, 1);
        assert!(config.caps_for(CapacityBand::Low).is_monotone());
    }
}
