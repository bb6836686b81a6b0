//! Job profile and rubric parsing from YAML/JSON.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::schema::validate_job_schema;
use super::validator::{RubricError, RubricValidator};

/// One named axis of evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Criterion {
    /// Identifier, unique within its rubric (e.g. "sys_design")
    pub key: String,

    /// Non-negative weight; all weights of a rubric sum to 1.0
    pub weight: f64,

    /// What the criterion measures
    #[serde(default)]
    pub description: String,
}

impl Criterion {
    pub fn new(key: impl Into<String>, weight: f64, description: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            weight,
            description: description.into(),
        }
    }
}

/// A validated, immutable, ordered set of criteria.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "Vec<Criterion>", into = "Vec<Criterion>")]
pub struct Rubric {
    criteria: Vec<Criterion>,
}

impl Rubric {
    /// Validate and wrap a list of criteria.
    pub fn new(criteria: Vec<Criterion>) -> Result<Self, RubricError> {
        RubricValidator::new().validate(&criteria)?;
        Ok(Self { criteria })
    }

    /// Criteria in rubric order.
    pub fn criteria(&self) -> &[Criterion] {
        &self.criteria
    }

    pub fn len(&self) -> usize {
        self.criteria.len()
    }

    /// Always false for a validated rubric.
    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    /// Look up a criterion by key.
    pub fn get(&self, key: &str) -> Option<&Criterion> {
        self.criteria.iter().find(|c| c.key == key)
    }

    /// Weight of a criterion, if the key exists.
    pub fn weight(&self, key: &str) -> Option<f64> {
        self.get(key).map(|c| c.weight)
    }

    /// Criterion keys in rubric order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.criteria.iter().map(|c| c.key.as_str())
    }
}

impl TryFrom<Vec<Criterion>> for Rubric {
    type Error = RubricError;

    fn try_from(criteria: Vec<Criterion>) -> Result<Self, Self::Error> {
        Rubric::new(criteria)
    }
}

impl From<Rubric> for Vec<Criterion> {
    fn from(rubric: Rubric) -> Self {
        rubric.criteria
    }
}

/// Wire shape of a job profile before rubric validation.
#[derive(Deserialize)]
struct RawJobProfile {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    role_context: String,
    rubric: Vec<Criterion>,
}

/// A job definition: the rubric plus the text that shapes heuristic scoring.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobProfile {
    /// Human-readable job title
    pub title: String,

    /// Job description
    #[serde(default)]
    pub description: String,

    /// Free text about the role (e.g. "backend platform, kubernetes")
    #[serde(default)]
    pub role_context: String,

    /// Weighted rubric
    pub rubric: Rubric,
}

impl JobProfile {
    /// Parse a job profile from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, RubricError> {
        let value: serde_json::Value = serde_yaml::from_str(yaml)?;
        Self::from_value(value)
    }

    /// Parse a job profile from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, RubricError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Parse a job profile from a file; `.json` files are read as JSON,
    /// anything else as YAML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RubricError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&contents),
            _ => Self::from_yaml(&contents),
        }
    }

    /// Schema-check, then semantically validate the rubric.
    pub fn from_value(value: serde_json::Value) -> Result<Self, RubricError> {
        validate_job_schema(&value).map_err(RubricError::SchemaError)?;

        let raw: RawJobProfile = serde_json::from_value(value)?;
        let rubric = Rubric::new(raw.rubric)?;

        Ok(Self {
            title: raw.title,
            description: raw.description,
            role_context: raw.role_context,
            rubric,
        })
    }
}
