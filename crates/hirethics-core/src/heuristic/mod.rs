//! Keyword-based fallback scoring.
//!
//! Used whenever the primary scorer is unavailable, slow or returns
//! something unusable, and as the offline scorer for CLI audits.

mod keywords;
mod scorer;

pub use keywords::{KeywordPattern, KeywordTable, RoleOverlays};
pub use scorer::{match_score, HeuristicScorer, MAX_EVIDENCE_LEN};
