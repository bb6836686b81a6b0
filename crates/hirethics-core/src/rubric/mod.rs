//! Job profiles and weighted rubrics.
//!
//! A [`Rubric`] can only be constructed through [`RubricValidator`], so any
//! `Rubric` value held by the rest of the engine is known to be valid.

mod parser;
mod schema;
mod validator;

pub use parser::{Criterion, JobProfile, Rubric};
pub use schema::validate_job_schema;
pub use validator::{RubricError, RubricValidator, WEIGHT_TOLERANCE};
