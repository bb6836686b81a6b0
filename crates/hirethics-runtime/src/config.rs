//! Runtime configuration.
//!
//! ```yaml
//! delta_threshold: 0.25
//! default_top_k: 5
//! strict_token_list: [MIT, Stanford]
//! primary_timeout: 10s
//! max_concurrency: 4
//! circuit_breaker:
//!   failure_threshold: 3
//!   recovery_timeout: 30s
//! completion:
//!   model: gpt-4o-mini
//! provider:
//!   type: openai
//!   settings:
//!     base_url: https://api.openai.com/v1
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use hirethics_core::AuditConfig;

use crate::providers::CompletionConfig;
use crate::resilience::{CircuitBreakerConfig, RetryPolicy};

/// Errors loading or validating [`RuntimeConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Everything the async engine needs, including the core [`AuditConfig`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    #[serde(flatten)]
    pub audit: AuditConfig,

    /// Upper bound on one primary scoring call, retries included
    #[serde(with = "duration_human")]
    pub primary_timeout: Duration,

    /// Candidates scored concurrently within a batch
    pub max_concurrency: usize,

    pub circuit_breaker: CircuitBreakerConfig,

    pub report_cache: ReportCacheConfig,

    pub completion: CompletionSettings,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderSettings>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            audit: AuditConfig::default(),
            primary_timeout: Duration::from_secs(10),
            max_concurrency: 4,
            circuit_breaker: CircuitBreakerConfig::default(),
            report_cache: ReportCacheConfig::default(),
            completion: CompletionSettings::default(),
            provider: None,
        }
    }
}

impl RuntimeConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a YAML file. JSON is valid YAML, so `.json` files work too.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.audit
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        if self.primary_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "primary_timeout must be greater than zero".to_string(),
            ));
        }
        if self.max_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.circuit_breaker.failure_threshold == 0
            || self.circuit_breaker.success_threshold == 0
        {
            return Err(ConfigError::Invalid(
                "circuit_breaker thresholds must be at least 1".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.completion.temperature) {
            return Err(ConfigError::Invalid(format!(
                "completion.temperature must be within [0, 2], got {}",
                self.completion.temperature
            )));
        }
        Ok(())
    }
}

/// Report cache sizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportCacheConfig {
    pub max_entries: u64,

    #[serde(with = "duration_human")]
    pub ttl: Duration,
}

impl Default for ReportCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1_000,
            ttl: Duration::from_secs(3600),
        }
    }
}

/// Settings for primary scorer completions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub retry: RetryPolicy,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        let defaults = CompletionConfig::default();
        Self {
            model: defaults.model,
            temperature: defaults.temperature,
            max_tokens: defaults.max_tokens,
            retry: RetryPolicy::default(),
        }
    }
}

impl CompletionSettings {
    /// Request settings; each request may use the whole primary timeout.
    pub fn completion_config(&self, timeout: Duration) -> CompletionConfig {
        CompletionConfig {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            timeout,
            json_mode: true,
        }
    }
}

/// Which provider backs the primary scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(rename = "type")]
    pub provider_type: String,

    #[serde(default)]
    pub settings: serde_json::Value,
}

/// Serde helper: durations as humantime strings ("10s", "1m 30s") or bare
/// integer seconds.
pub(crate) mod duration_human {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Secs(u64),
        Text(String),
    }

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Raw::deserialize(deserializer)? {
            Raw::Secs(secs) => Ok(Duration::from_secs(secs)),
            Raw::Text(text) => {
                humantime::parse_duration(text.trim()).map_err(serde::de::Error::custom)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.audit.delta_threshold, 0.25);
        assert_eq!(config.primary_timeout, Duration::from_secs(10));
        assert_eq!(config.max_concurrency, 4);
        assert!(config.provider.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
delta_threshold: 0.5
default_top_k: 3
strict_token_list: [MIT, Google]
masking:
  generic_tokens: false
primary_timeout: 2s
max_concurrency: 8
circuit_breaker:
  failure_threshold: 5
  recovery_timeout: 1m
report_cache:
  ttl: 120
completion:
  model: gpt-4o
  retry:
    max_retries: 1
provider:
  type: openai
  settings:
    base_url: http://localhost:8080/v1
"#;
        let config = RuntimeConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.audit.delta_threshold, 0.5);
        assert_eq!(config.audit.default_top_k, 3);
        assert_eq!(config.audit.strict_token_list, vec!["MIT", "Google"]);
        assert!(!config.audit.masking.generic_tokens);
        assert!(config.audit.masking.identity);
        assert_eq!(config.primary_timeout, Duration::from_secs(2));
        assert_eq!(config.circuit_breaker.recovery_timeout, Duration::from_secs(60));
        assert_eq!(config.report_cache.ttl, Duration::from_secs(120));
        assert_eq!(config.completion.model, "gpt-4o");
        assert_eq!(config.completion.retry.max_retries, 1);

        let provider = config.provider.unwrap();
        assert_eq!(provider.provider_type, "openai");
        assert_eq!(provider.settings["base_url"], "http://localhost:8080/v1");
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            RuntimeConfig::from_yaml("max_concurrency: 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            RuntimeConfig::from_yaml("delta_threshold: -1.0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            RuntimeConfig::from_yaml("primary_timeout: soon"),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn test_duration_serializes_human_readable() {
        let yaml = serde_yaml::to_string(&RuntimeConfig::default()).unwrap();
        assert!(yaml.contains("primary_timeout: 10s"));
        let back = RuntimeConfig::from_yaml(&yaml).unwrap();
        assert_eq!(back, RuntimeConfig::default());
    }
}
