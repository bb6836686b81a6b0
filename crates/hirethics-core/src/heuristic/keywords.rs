//! Keyword tables for the heuristic scorer.
//!
//! Four well-known criterion keys have built-in tables. The role context of
//! the job selects discipline overlays (frontend, backend, data, platform,
//! retrieval/LLM) that extend or replace the base lists. Any other key gets
//! patterns derived from its own description.

use regex::Regex;

use crate::rubric::{Criterion, Rubric};

const SYS_DESIGN: &[&str] = &[
    "system design",
    "architecture",
    "microservice",
    "distributed",
    "scalable",
    "scalability",
    "throughput",
    "latency",
    "event-driven",
    "caching",
    "message queue",
    "pub/sub",
];

const PROD_OWNERSHIP: &[&str] = &[
    "on-call",
    "oncall",
    "incident",
    "postmortem",
    "slo",
    "observability",
    "monitoring",
    "alerting",
    "pagerduty",
    "grafana",
    "prometheus",
    "runbook",
];

const LANG_STACK: &[&str] = &[
    "python",
    "fastapi",
    "django",
    "flask",
    "rust",
    "golang",
    "java",
    "sql",
    "postgres",
    "postgresql",
    "mysql",
    "redis",
];

const CODE_QUALITY: &[&str] = &[
    "unit test",
    "integration test",
    "pytest",
    "code review",
    "linting",
    "test coverage",
    "refactoring",
    "documentation",
    "openapi",
    "type safety",
];

const FRONTEND_DESIGN: &[&str] = &[
    "component design",
    "state management",
    "performance",
    "accessibility",
];

const FRONTEND_STACK: &[&str] = &[
    "react",
    "typescript",
    "javascript",
    "next.js",
    "vite",
    "redux",
    "tailwind",
    "css",
    "webpack",
    "graphql",
    "rest",
];

const FRONTEND_QUALITY: &[&str] = &[
    "jest",
    "testing library",
    "playwright",
    "cypress",
    "storybook",
    "lighthouse",
    "openapi",
];

const BACKEND_STACK: &[&str] = &["rest", "graphql", "grpc", "openapi", "celery", "kafka"];

const DATA_STACK: &[&str] = &[
    "spark",
    "pyspark",
    "airflow",
    "dbt",
    "kafka",
    "snowflake",
    "bigquery",
    "redshift",
    "parquet",
    "pandas",
    "polars",
    "sql",
    "warehouse",
];

const DATA_QUALITY: &[&str] = &["data quality", "lineage", "great expectations", "data contract"];

const PLATFORM_OWNERSHIP: &[&str] = &["sla", "error budget", "sre"];

const PLATFORM_STACK: &[&str] = &[
    "kubernetes",
    "docker",
    "terraform",
    "ansible",
    "helm",
    "aws",
    "gcp",
    "azure",
    "ci/cd",
    "github actions",
];

const RETRIEVAL_STACK: &[&str] = &[
    "retrieval",
    "embedding",
    "vector database",
    "pgvector",
    "langchain",
    "llamaindex",
    "reranking",
    "transformers",
    "hugging face",
];

const RETRIEVAL_QUALITY: &[&str] = &["evaluation", "evals", "guardrail", "tracing", "prompt testing"];

const FRONTEND_ROLE: &[&str] = &["frontend", "front-end", "react", "typescript", "ui"];
const BACKEND_ROLE: &[&str] = &["backend", "back-end", "api", "golang", "django", "fastapi"];
const DATA_ROLE: &[&str] = &["data engineer", "etl", "warehouse", "spark", "airflow", "dbt"];
const PLATFORM_ROLE: &[&str] = &["devops", "platform", "sre", "kubernetes", "terraform"];
const RETRIEVAL_ROLE: &[&str] = &["rag", "llm", "retrieval", "embedding", "langchain"];

const STOP_WORDS: &[&str] = &[
    "about", "above", "after", "again", "being", "below", "between", "could", "their", "there",
    "these", "those", "through", "under", "where", "which", "while", "would", "should", "skills",
    "ability", "experience", "candidate", "demonstrated", "strong",
];

/// Longest list of patterns derived from a criterion description.
const MAX_DERIVED_KEYWORDS: usize = 8;

/// A keyword and its compiled, case-insensitive, word-bounded matcher.
#[derive(Debug, Clone)]
pub struct KeywordPattern {
    pub keyword: String,
    regex: Regex,
}

impl KeywordPattern {
    /// Compile a keyword. Words may be separated by spaces or hyphens in the
    /// text, and a plural suffix is accepted.
    pub fn compile(keyword: &str) -> Option<Self> {
        let keyword = keyword.trim().to_lowercase();
        if keyword.is_empty() {
            return None;
        }

        let body = keyword
            .split(|c: char| c.is_whitespace() || c == '-')
            .filter(|w| !w.is_empty())
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(r"[\s\-]+");

        let starts_word = keyword.chars().next().is_some_and(|c| c.is_alphanumeric());
        let ends_word = keyword.chars().last().is_some_and(|c| c.is_alphanumeric());

        let pattern = format!(
            "(?i){}{}{}",
            if starts_word { r"\b" } else { "" },
            body,
            if ends_word { r"(?:e?s)?\b" } else { "" },
        );

        match Regex::new(&pattern) {
            Ok(regex) => Some(Self { keyword, regex }),
            Err(e) => {
                tracing::warn!(keyword = %keyword, error = %e, "Skipping uncompilable keyword");
                None
            }
        }
    }

    /// Byte range of the first match in `text`.
    pub fn find(&self, text: &str) -> Option<(usize, usize)> {
        self.regex.find(text).map(|m| (m.start(), m.end()))
    }
}

/// Compiled keyword patterns for each criterion of one job.
#[derive(Debug, Clone, Default)]
pub struct KeywordTable {
    entries: Vec<(String, Vec<KeywordPattern>)>,
}

impl KeywordTable {
    /// Build the table for a rubric, applying overlays chosen by `role_context`.
    pub fn for_role(role_context: &str, rubric: &Rubric) -> Self {
        let overlays = RoleOverlays::detect(role_context);

        let entries = rubric
            .criteria()
            .iter()
            .map(|criterion| {
                let keywords = overlays.keywords_for(criterion);
                let patterns = dedupe(keywords)
                    .iter()
                    .filter_map(|k| KeywordPattern::compile(k))
                    .collect();
                (criterion.key.clone(), patterns)
            })
            .collect();

        Self { entries }
    }

    /// Patterns for a criterion key, in table order.
    pub fn patterns(&self, key: &str) -> &[KeywordPattern] {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, p)| p.as_slice())
            .unwrap_or(&[])
    }

    /// Whether the table was built for this criterion key.
    pub fn covers(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }
}

/// Disciplines mentioned by a role context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoleOverlays {
    pub frontend: bool,
    pub backend: bool,
    pub data: bool,
    pub platform: bool,
    pub retrieval: bool,
}

impl RoleOverlays {
    pub fn detect(role_context: &str) -> Self {
        let context = role_context.to_lowercase();
        Self {
            frontend: mentions_any(&context, FRONTEND_ROLE),
            backend: mentions_any(&context, BACKEND_ROLE),
            data: mentions_any(&context, DATA_ROLE),
            platform: mentions_any(&context, PLATFORM_ROLE),
            retrieval: mentions_any(&context, RETRIEVAL_ROLE),
        }
    }

    fn keywords_for(&self, criterion: &Criterion) -> Vec<String> {
        let mut list: Vec<&str> = match criterion.key.as_str() {
            "sys_design" => SYS_DESIGN.to_vec(),
            "prod_ownership" => PROD_OWNERSHIP.to_vec(),
            "lang_stack" => LANG_STACK.to_vec(),
            "code_quality" => CODE_QUALITY.to_vec(),
            _ => return derive_keywords(&criterion.description),
        };

        match criterion.key.as_str() {
            "sys_design" => {
                if self.frontend {
                    list.extend_from_slice(FRONTEND_DESIGN);
                }
            }
            "prod_ownership" => {
                if self.platform {
                    list.extend_from_slice(PLATFORM_OWNERSHIP);
                }
            }
            "lang_stack" => {
                // Replacing overlays first, so extensions always survive
                if self.data {
                    list = DATA_STACK.to_vec();
                } else if self.frontend {
                    list = FRONTEND_STACK.to_vec();
                }
                if self.backend {
                    list.extend_from_slice(BACKEND_STACK);
                }
                if self.platform {
                    list.extend_from_slice(PLATFORM_STACK);
                }
                if self.retrieval {
                    list.extend_from_slice(RETRIEVAL_STACK);
                }
            }
            "code_quality" => {
                if self.frontend {
                    list = FRONTEND_QUALITY.to_vec();
                }
                if self.data {
                    list.extend_from_slice(DATA_QUALITY);
                }
                if self.retrieval {
                    list.extend_from_slice(RETRIEVAL_QUALITY);
                }
            }
            _ => {}
        }

        list.into_iter().map(str::to_string).collect()
    }
}

/// True when `haystack` (lowercase) contains any needle as a whole phrase.
fn mentions_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| {
        haystack.match_indices(needle).any(|(start, matched)| {
            let end = start + matched.len();
            let before_ok = haystack[..start]
                .chars()
                .next_back()
                .map_or(true, |c| !c.is_alphanumeric());
            let after_ok = haystack[end..]
                .chars()
                .next()
                .map_or(true, |c| !c.is_alphanumeric());
            before_ok && after_ok
        })
    })
}

/// Keywords taken from a free-text criterion description.
fn derive_keywords(description: &str) -> Vec<String> {
    let mut words: Vec<String> = description
        .split(|c: char| !c.is_alphabetic())
        .filter(|w| w.chars().count() >= 5)
        .map(str::to_lowercase)
        .filter(|w| !STOP_WORDS.contains(&w.as_str()))
        .collect();
    words = dedupe(words);
    words.truncate(MAX_DERIVED_KEYWORDS);
    words
}

/// Remove duplicates, keeping the first occurrence.
fn dedupe(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}
