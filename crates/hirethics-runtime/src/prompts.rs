//! Prompts for the LLM rubric scorer.
//!
//! The system prompt is fixed so providers can cache it; the user prompt
//! carries the job, the rubric and the CV.

use std::fmt::Write;

use hirethics_core::{JobProfile, Rubric};

use crate::providers::ChatMessage;

/// System prompt for rubric scoring.
pub const SYSTEM_PROMPT: &str = r#"You are an AI hiring evaluator. Score the candidate CV against each rubric criterion.

## Constraints
1. Only use evidence from the CV. Do not infer anything the CV does not say.
2. Ignore names, contact details, schools, employers' prestige and other proxies; score job-relevant content only.
3. Quote evidence_span verbatim from the CV (max 240 characters), or leave it empty if there is none.
4. Score each criterion from 0 to 5 in steps of 0.5.
5. Return STRICT JSON and nothing else.

## Output Format (JSON)
{
  "by_criterion": [
    {
      "key": "criterion key exactly as given",
      "score": 0.0,
      "evidence_span": "verbatim quote from the CV",
      "rationale": "one or two sentences"
    }
  ]
}
"#;

/// One `- key: weight=.. desc=..` line per criterion.
pub fn rubric_lines(rubric: &Rubric) -> String {
    let mut out = String::new();
    for criterion in rubric.criteria() {
        let _ = writeln!(
            out,
            "- {}: weight={:.2} desc={}",
            criterion.key, criterion.weight, criterion.description
        );
    }
    out
}

/// User prompt for one candidate text.
pub fn scoring_prompt(profile: &JobProfile, text: &str) -> String {
    let mut prompt = String::new();
    let _ = writeln!(prompt, "Job title: {}", profile.title);
    if !profile.description.trim().is_empty() {
        let _ = writeln!(prompt, "Job description: {}", profile.description.trim());
    }
    let _ = writeln!(prompt, "\nRubric:");
    prompt.push_str(&rubric_lines(&profile.rubric));
    let _ = writeln!(prompt, "\nCandidate CV:\n\"\"\"\n{}\n\"\"\"", text);
    prompt.push_str("\nReturn JSON for ALL rubric keys, in the same order.");
    prompt
}

/// Messages for one scoring request.
pub fn scoring_messages(profile: &JobProfile, text: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::user(scoring_prompt(profile, text)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_lists_every_criterion() {
        let profile = JobProfile::from_yaml(
            r#"
title: "Data Engineer"
description: "Owns pipelines"
rubric:
  - key: lang_stack
    weight: 0.6
    description: "Python and SQL"
  - key: code_quality
    weight: 0.4
"#,
        )
        .unwrap();

        let messages = scoring_messages(&profile, "Built Airflow DAGs.");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");

        let user = &messages[1].content;
        assert!(user.contains("Job title: Data Engineer"));
        assert!(user.contains("- lang_stack: weight=0.60 desc=Python and SQL"));
        assert!(user.contains("- code_quality: weight=0.40"));
        assert!(user.contains("\"\"\"\nBuilt Airflow DAGs.\n\"\"\""));
        assert!(user.ends_with("in the same order."));
    }
}
