//! Primary scorer backed by a chat-completion model.

use async_trait::async_trait;
use backon::Retryable;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use hirethics_core::heuristic::MAX_EVIDENCE_LEN;
use hirethics_core::{CriterionScore, JobProfile, MAX_SCORE};

use super::{CriterionScorer, ScorerError};
use crate::prompts;
use crate::providers::{CompletionConfig, LlmProvider, ProviderError};
use crate::resilience::RetryPolicy;

/// Longest rationale kept from a model response, in characters.
pub const MAX_RATIONALE_CHARS: usize = 400;

/// Asks an [`LlmProvider`] to score a CV and parses its JSON reply.
///
/// Transient provider errors are retried with exponential backoff. The
/// caller's timeout bounds the whole exchange, retries included.
pub struct LlmRubricScorer {
    provider: Arc<dyn LlmProvider>,
    completion: CompletionConfig,
    retry: RetryPolicy,
}

impl LlmRubricScorer {
    pub fn new(provider: Arc<dyn LlmProvider>, completion: CompletionConfig) -> Self {
        Self {
            provider,
            completion,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl CriterionScorer for LlmRubricScorer {
    async fn score(
        &self,
        profile: &JobProfile,
        text: &str,
    ) -> Result<Vec<CriterionScore>, ScorerError> {
        let messages = prompts::scoring_messages(profile, text);
        let provider = &self.provider;
        let completion = &self.completion;

        let response = (|| {
            let messages = messages.clone();
            async move { provider.complete(messages, completion).await }
        })
        .retry(self.retry.backoff())
        .when(ProviderError::is_transient)
        .notify(|err: &ProviderError, delay: Duration| {
            tracing::warn!(
                provider = provider.name(),
                error = %err,
                retry_in = ?delay,
                "Transient provider error, retrying"
            );
        })
        .await?;

        tracing::debug!(
            provider = provider.name(),
            model = %response.model,
            tokens = response.usage.total(),
            "Primary scorer completed"
        );

        parse_scores(&response.content)
    }

    fn name(&self) -> &str {
        self.provider.name()
    }
}

#[derive(Debug, Deserialize)]
struct ScoresReply {
    by_criterion: Vec<ScoredEntry>,
}

#[derive(Debug, Deserialize)]
struct ScoredEntry {
    key: String,
    score: f64,
    #[serde(default)]
    evidence_span: String,
    #[serde(default)]
    rationale: String,
}

/// Parse a model reply of the form
/// `{"by_criterion": [{"key", "score", "evidence_span", "rationale"}]}`.
///
/// Scores are rounded to the nearest 0.5 and clamped to `[0, 5]`; evidence
/// and rationale are cut to 240 and 400 characters. Keys are not checked
/// against the rubric here.
pub fn parse_scores(content: &str) -> Result<Vec<CriterionScore>, ScorerError> {
    let json = json_object(content)
        .ok_or_else(|| ScorerError::Malformed("reply contains no JSON object".to_string()))?;

    let reply: ScoresReply =
        serde_json::from_str(json).map_err(|e| ScorerError::Malformed(e.to_string()))?;

    Ok(reply
        .by_criterion
        .into_iter()
        .map(|entry| CriterionScore {
            criterion_key: entry.key.trim().to_string(),
            score: ((entry.score * 2.0).round() / 2.0).clamp(0.0, MAX_SCORE),
            evidence_span: truncate_chars(entry.evidence_span.trim(), MAX_EVIDENCE_LEN),
            rationale: truncate_chars(entry.rationale.trim(), MAX_RATIONALE_CHARS),
        })
        .collect())
}

/// The outermost `{...}` of a reply, tolerating code fences or chatter.
fn json_object(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    (start < end).then(|| &content[start..=end])
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
