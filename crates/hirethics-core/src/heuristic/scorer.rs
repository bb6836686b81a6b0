//! Deterministic keyword scorer.

use crate::rubric::{JobProfile, Rubric};
use crate::types::{CriterionScore, ScoreResult, ScoreSource, MAX_SCORE};

use super::keywords::{KeywordPattern, KeywordTable};

/// Longest evidence span the heuristic quotes, in bytes.
pub const MAX_EVIDENCE_LEN: usize = 240;

/// Score for a criterion whose first keyword matched.
const FIRST_MATCH_SCORE: f64 = 2.5;

/// Increment for each further distinct keyword.
const EXTRA_MATCH_SCORE: f64 = 1.0;

/// Scores a text by counting distinct criterion keywords.
///
/// The same inputs always give the same output. Evidence is always a
/// verbatim excerpt of the scored text, so the heuristic's own spans are
/// substantiated by construction.
#[derive(Debug, Clone, Default)]
pub struct HeuristicScorer {
    table: KeywordTable,
}

impl HeuristicScorer {
    pub fn new(table: KeywordTable) -> Self {
        Self { table }
    }

    /// Scorer with keyword tables tuned to a job's role context.
    pub fn for_job(profile: &JobProfile) -> Self {
        Self::new(KeywordTable::for_role(&profile.role_context, &profile.rubric))
    }

    /// Score a text against every criterion of `rubric`.
    pub fn score(&self, rubric: &Rubric, text: &str) -> ScoreResult {
        ScoreResult::assemble(rubric, self.score_criteria(rubric, text), ScoreSource::Fallback)
    }

    /// Per-criterion scores in rubric order, without the weighted total.
    pub fn score_criteria(&self, rubric: &Rubric, text: &str) -> Vec<CriterionScore> {
        rubric
            .keys()
            .map(|key| self.score_criterion(key, text))
            .collect()
    }

    fn score_criterion(&self, key: &str, text: &str) -> CriterionScore {
        if !self.table.covers(key) {
            tracing::debug!(criterion = key, "No keyword table for criterion");
        }

        let hits: Vec<(&KeywordPattern, (usize, usize))> = self
            .table
            .patterns(key)
            .iter()
            .filter_map(|p| p.find(text).map(|range| (p, range)))
            .collect();

        // First by position, then by table order
        let earliest = hits.iter().min_by_key(|(_, (start, _))| *start);

        let Some((_, (start, end))) = earliest else {
            return CriterionScore {
                criterion_key: key.to_string(),
                score: 0.0,
                evidence_span: String::new(),
                rationale: format!("No keywords for '{key}' found"),
            };
        };

        let matched: Vec<&str> = hits.iter().map(|(p, _)| p.keyword.as_str()).collect();

        CriterionScore {
            criterion_key: key.to_string(),
            score: match_score(matched.len()),
            evidence_span: evidence_window(text, *start, *end).to_string(),
            rationale: format!(
                "Matched {} keyword(s): {}",
                matched.len(),
                matched.join(", ")
            ),
        }
    }
}

/// 0 for no matches, then 2.5, 3.5, 4.5, capped at 5.
pub fn match_score(matches: usize) -> f64 {
    if matches == 0 {
        return 0.0;
    }
    let score = FIRST_MATCH_SCORE + EXTRA_MATCH_SCORE * (matches - 1) as f64;
    score.min(MAX_SCORE)
}

/// The line around a match, trimmed and windowed to [`MAX_EVIDENCE_LEN`].
fn evidence_window(text: &str, start: usize, end: usize) -> &str {
    let line_start = text[..start].rfind('\n').map_or(0, |i| i + 1);
    let line_end = text[end..].find('\n').map_or(text.len(), |i| end + i);

    if line_end - line_start <= MAX_EVIDENCE_LEN {
        return text[line_start..line_end].trim();
    }

    let (from, to) = if end - start >= MAX_EVIDENCE_LEN {
        (start, start + MAX_EVIDENCE_LEN)
    } else {
        let slack = MAX_EVIDENCE_LEN - (end - start);
        let from = start - (slack / 2).min(start - line_start);
        (from, (from + MAX_EVIDENCE_LEN).min(line_end))
    };

    text[ceil_boundary(text, from)..floor_boundary(text, to)].trim()
}

fn ceil_boundary(text: &str, mut i: usize) -> usize {
    while i < text.len() && !text.is_char_boundary(i) {
        i += 1;
    }
    i
}

fn floor_boundary(text: &str, mut i: usize) -> usize {
    while i > 0 && !text.is_char_boundary(i) {
        i -= 1;
    }
    i
}
