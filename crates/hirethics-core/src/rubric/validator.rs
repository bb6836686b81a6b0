//! Semantic validation of rubric definitions.
//!
//! Structural problems (wrong types, unknown fields) are caught by the JSON
//! Schema in [`super::schema`]. This module checks what a schema cannot:
//! unique keys, finite non-negative weights, and a weight sum of 1.0.

use std::collections::HashSet;
use thiserror::Error;

use super::Criterion;

/// Allowed distance between the weight sum and 1.0.
pub const WEIGHT_TOLERANCE: f64 = 0.01;

/// Errors produced while loading or validating a rubric.
#[derive(Error, Debug)]
pub enum RubricError {
    #[error("Failed to read job profile: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Job profile does not match schema: {}", .0.join("; "))]
    SchemaError(Vec<String>),

    #[error("Rubric must contain at least one criterion")]
    Empty,

    #[error("Criterion #{index} has an empty key")]
    EmptyKey { index: usize },

    #[error("Duplicate criterion key '{key}' at #{index}")]
    DuplicateKey { index: usize, key: String },

    #[error("Criterion '{key}' has invalid weight {weight}: weights must be finite and >= 0")]
    InvalidWeight { key: String, weight: f64 },

    #[error("Criterion weights sum to {sum:.4}, expected 1.0 (tolerance {tolerance})")]
    WeightSum { sum: f64, tolerance: f64 },
}

/// Checks a criterion list before it becomes a [`super::Rubric`].
///
/// Validation fails fast: the first problem found is reported.
#[derive(Debug, Clone, Copy)]
pub struct RubricValidator {
    tolerance: f64,
}

impl RubricValidator {
    pub fn new() -> Self {
        Self {
            tolerance: WEIGHT_TOLERANCE,
        }
    }

    /// Use a custom weight-sum tolerance.
    pub fn with_tolerance(tolerance: f64) -> Self {
        Self { tolerance }
    }

    /// Validate a list of criteria.
    pub fn validate(&self, criteria: &[Criterion]) -> Result<(), RubricError> {
        if criteria.is_empty() {
            return Err(RubricError::Empty);
        }

        let mut seen = HashSet::new();
        for (index, criterion) in criteria.iter().enumerate() {
            if criterion.key.trim().is_empty() {
                return Err(RubricError::EmptyKey { index });
            }
            if !seen.insert(criterion.key.as_str()) {
                return Err(RubricError::DuplicateKey {
                    index,
                    key: criterion.key.clone(),
                });
            }
            if !criterion.weight.is_finite() || criterion.weight < 0.0 {
                return Err(RubricError::InvalidWeight {
                    key: criterion.key.clone(),
                    weight: criterion.weight,
                });
            }
        }

        let sum: f64 = criteria.iter().map(|c| c.weight).sum();
        if (sum - 1.0).abs() > self.tolerance {
            return Err(RubricError::WeightSum {
                sum,
                tolerance: self.tolerance,
            });
        }

        Ok(())
    }
}

impl Default for RubricValidator {
    fn default() -> Self {
        Self::new()
    }
}
