//! Cohort statistics over a scored batch.
//!
//! Everything here is a pure function of the per-candidate totals and flags;
//! evaluating the same input twice gives the same report.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use crate::types::{CandidateAudit, EthicsFlag, FlagType, Severity};

/// What the evaluator needs from one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSummary {
    pub candidate_id: String,
    pub total_before: f64,
    pub total_after: f64,
    pub flags: Vec<EthicsFlag>,
}

impl CandidateSummary {
    pub fn delta(&self) -> f64 {
        self.total_before - self.total_after
    }
}

impl From<&CandidateAudit> for CandidateSummary {
    fn from(audit: &CandidateAudit) -> Self {
        Self {
            candidate_id: audit.candidate_id.clone(),
            total_before: audit.baseline.total,
            total_after: audit.blinded.total,
            flags: audit.flags.clone(),
        }
    }
}

/// One row of the per-candidate table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateReport {
    pub candidate_id: String,
    pub total_before: f64,
    pub total_after: f64,

    /// `total_before − total_after`
    pub delta: f64,

    pub flags: Vec<FlagType>,
}

/// Aggregate view of one batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub n: usize,

    /// Requested k
    pub k: usize,

    /// `min(k, n)`
    pub k_effective: usize,

    /// Rank correlation of baseline vs blinded ordering; `None` when undefined
    pub spearman_rho: Option<f64>,

    pub topk_overlap_count: usize,
    pub topk_overlap_ratio: f64,
    pub mean_delta: f64,
    pub mean_abs_delta: f64,
    pub flags_by_type: BTreeMap<FlagType, usize>,
    pub flags_by_severity: BTreeMap<Severity, usize>,
    pub per_candidate: Vec<CandidateReport>,
}

/// Computes [`BatchReport`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchEvaluator;

impl BatchEvaluator {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(&self, candidates: &[CandidateSummary], k: usize) -> BatchReport {
        let n = candidates.len();
        let k_effective = k.min(n);

        let before: Vec<f64> = candidates.iter().map(|c| c.total_before).collect();
        let after: Vec<f64> = candidates.iter().map(|c| c.total_after).collect();

        let order_before = ordinal_order(candidates, &before);
        let order_after = ordinal_order(candidates, &after);

        let spearman_rho = spearman(
            &average_ranks(&order_before, &before),
            &average_ranks(&order_after, &after),
        );

        let top_before: BTreeSet<usize> = order_before.iter().take(k_effective).copied().collect();
        let topk_overlap_count = order_after
            .iter()
            .take(k_effective)
            .filter(|i| top_before.contains(i))
            .count();
        let topk_overlap_ratio = if k_effective == 0 {
            0.0
        } else {
            topk_overlap_count as f64 / k_effective as f64
        };

        let (mean_delta, mean_abs_delta) = if n == 0 {
            (0.0, 0.0)
        } else {
            let deltas = candidates.iter().map(CandidateSummary::delta);
            let sum: f64 = deltas.clone().sum();
            let abs_sum: f64 = deltas.map(f64::abs).sum();
            (sum / n as f64, abs_sum / n as f64)
        };

        let mut flags_by_type = BTreeMap::new();
        let mut flags_by_severity = BTreeMap::new();
        for flag in candidates.iter().flat_map(|c| &c.flags) {
            *flags_by_type.entry(flag.flag_type).or_insert(0) += 1;
            *flags_by_severity.entry(flag.severity).or_insert(0) += 1;
        }

        let per_candidate = candidates
            .iter()
            .map(|c| CandidateReport {
                candidate_id: c.candidate_id.clone(),
                total_before: c.total_before,
                total_after: c.total_after,
                delta: c.delta(),
                flags: c.flags.iter().map(|f| f.flag_type).collect(),
            })
            .collect();

        BatchReport {
            n,
            k,
            k_effective,
            spearman_rho,
            topk_overlap_count,
            topk_overlap_ratio,
            mean_delta,
            mean_abs_delta,
            flags_by_type,
            flags_by_severity,
            per_candidate,
        }
    }
}

/// Candidate indices best-first: total descending, then candidate id.
fn ordinal_order(candidates: &[CandidateSummary], totals: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by(|&a, &b| {
        totals[b]
            .total_cmp(&totals[a])
            .then_with(|| candidates[a].candidate_id.cmp(&candidates[b].candidate_id))
    });
    order
}

/// 1-based ranks indexed by candidate; equal totals share their mean rank.
fn average_ranks(order: &[usize], totals: &[f64]) -> Vec<f64> {
    let mut ranks = vec![0.0; order.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len()
            && totals[order[end]].total_cmp(&totals[order[start]]) == Ordering::Equal
        {
            end += 1;
        }
        // positions start..end hold ranks start+1..=end
        let rank = (start + 1 + end) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = rank;
        }
        start = end;
    }
    ranks
}

/// Pearson correlation of two rank vectors.
fn spearman(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len();
    if n < 2 {
        return None;
    }
    if x == y {
        return Some(1.0);
    }

    let mean_x = x.iter().sum::<f64>() / n as f64;
    let mean_y = y.iter().sum::<f64>() / n as f64;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (a, b) in x.iter().zip(y) {
        let (dx, dy) = (a - mean_x, b - mean_y);
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some((cov / (var_x * var_y).sqrt()).clamp(-1.0, 1.0))
}
