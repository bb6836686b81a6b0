//! JSON Schema validation for job profiles.
//!
//! Every job profile must validate against `schema/job.schema.json` before
//! its rubric is checked semantically.

use std::sync::OnceLock;

/// Embedded job profile schema (loaded at compile time).
const JOB_SCHEMA_JSON: &str = include_str!("../../../../schema/job.schema.json");

/// Compiled validator, built on first use.
static COMPILED_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

fn get_validator() -> Result<&'static jsonschema::Validator, String> {
    let result = COMPILED_SCHEMA.get_or_init(|| {
        let schema_value: serde_json::Value = serde_json::from_str(JOB_SCHEMA_JSON)
            .map_err(|e| format!("Invalid schema JSON: {}", e))?;

        jsonschema::options()
            .build(&schema_value)
            .map_err(|e| format!("Failed to compile schema: {}", e))
    });

    result.as_ref().map_err(|e| e.clone())
}

/// Validate a job profile JSON value against the schema.
///
/// Returns every violation found, formatted as `message at /instance/path`.
pub fn validate_job_schema(profile_json: &serde_json::Value) -> Result<(), Vec<String>> {
    let validator = get_validator().map_err(|e| vec![e])?;

    let errors: Vec<String> = validator
        .iter_errors(profile_json)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
