//! Audit configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::EngineError;

/// Default threshold for BLINDING_DELTA.
pub const DEFAULT_DELTA_THRESHOLD: f64 = 0.25;

/// Default top-k for batch reports.
pub const DEFAULT_TOP_K: usize = 5;

/// Institutions masked when no list is configured.
pub const DEFAULT_STRICT_TOKENS: &[&str] = &["MIT", "Stanford", "Harvard", "Oxford", "Cambridge"];

/// Settings that shape blinding, flagging and batch reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// `|delta|` at or above this raises BLINDING_DELTA
    pub delta_threshold: f64,

    /// k used when a report request does not give one
    pub default_top_k: usize,

    /// Institution and brand names removed verbatim
    pub strict_token_list: Vec<String>,

    /// Regex overrides for identity detection
    pub identity_field_patterns: IdentityPatterns,

    pub masking: MaskingConfig,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            delta_threshold: DEFAULT_DELTA_THRESHOLD,
            default_top_k: DEFAULT_TOP_K,
            strict_token_list: DEFAULT_STRICT_TOKENS.iter().map(|t| t.to_string()).collect(),
            identity_field_patterns: IdentityPatterns::default(),
            masking: MaskingConfig::default(),
        }
    }
}

impl AuditConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, EngineError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file; `.json` files are read as JSON, anything else as YAML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&contents),
            _ => Self::from_yaml(&contents),
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.delta_threshold.is_finite() || self.delta_threshold < 0.0 {
            return Err(EngineError::InvalidConfig(format!(
                "delta_threshold must be a non-negative number, got {}",
                self.delta_threshold
            )));
        }
        if self.strict_token_list.iter().any(|t| t.trim().is_empty()) {
            return Err(EngineError::InvalidConfig(
                "strict_token_list contains an empty token".to_string(),
            ));
        }
        Ok(())
    }
}

/// Optional replacements for the built-in identity patterns.
///
/// A name pattern replaces the "first name-like line" rule and is applied
/// to the whole text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityPatterns {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Which categories the blinder masks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaskingConfig {
    pub identity: bool,
    pub strict_tokens: bool,
    pub generic_tokens: bool,
}

impl Default for MaskingConfig {
    fn default() -> Self {
        Self {
            identity: true,
            strict_tokens: true,
            generic_tokens: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AuditConfig::default();
        assert_eq!(config.delta_threshold, 0.25);
        assert_eq!(config.default_top_k, 5);
        assert!(config.strict_token_list.iter().any(|t| t == "MIT"));
        assert!(config.masking.identity);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = AuditConfig::from_yaml(
            r#"
delta_threshold: 0.5
masking:
  generic_tokens: false
identity_field_patterns:
  phone: '\d{3}-\d{4}'
"#,
        )
        .unwrap();
        assert_eq!(config.delta_threshold, 0.5);
        assert_eq!(config.default_top_k, 5);
        assert!(config.masking.strict_tokens);
        assert!(!config.masking.generic_tokens);
        assert_eq!(config.identity_field_patterns.phone.as_deref(), Some(r"\d{3}-\d{4}"));
    }

    #[test]
    fn test_negative_threshold_rejected() {
        let result = AuditConfig::from_json(r#"{"delta_threshold": -1}"#);
        assert!(matches!(result, Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn test_empty_strict_token_rejected() {
        let result = AuditConfig::from_yaml("strict_token_list: ['MIT', ' ']");
        assert!(matches!(result, Err(EngineError::InvalidConfig(_))));
    }
}
