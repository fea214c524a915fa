//! Criterion scoring
//!
//! The gate only aggregates. Turning results into a 0–5 score for one
//! criterion is domain knowledge and is injected through [`CriterionScorer`].

use super::score::MAX_SCORE;
use crate::task::WorkerResult;
use crate::workflow::definition::RubricCriterion;

/// Scores one rubric criterion from the results that feed it
///
/// Implementations must be pure: the same criterion and results always give
/// the same score. Only successful results are passed in; the gate handles
/// errored results itself.
pub trait CriterionScorer: Send + Sync {
    /// Score in [0, 5]. Out-of-range values are clamped by the gate.
    fn score(&self, criterion: &RubricCriterion, results: &[&WorkerResult]) -> f64;
}

/// Default scorer: mean worker confidence scaled to the 0–5 range
///
/// # Example
///
/// ```
/// use phasegate_domain::quality::{ConfidenceScorer, CriterionScorer};
/// use phasegate_domain::task::{WorkerOutput, WorkerResult};
/// use phasegate_domain::core::ids::TaskId;
/// use phasegate_domain::workflow::definition::RubricCriterion;
///
/// let result = WorkerResult::success(
///     TaskId::new("visual", 0), "visual", "w",
///     WorkerOutput::new(serde_json::Value::Null, 0.8), 1,
/// );
/// let score = ConfidenceScorer.score(&RubricCriterion::new("quality", 1.0), &[&result]);
/// assert!((score - 4.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfidenceScorer;

impl CriterionScorer for ConfidenceScorer {
    fn score(&self, _criterion: &RubricCriterion, results: &[&WorkerResult]) -> f64 {
        if results.is_empty() {
            return 0.0;
        }
        let mean = results.iter().map(|r| r.confidence).sum::<f64>() / results.len() as f64;
        mean * MAX_SCORE
    }
}

/// Scorer reading a numeric field from each result's payload
///
/// Looks up `payload["scores"][criterion]`, falling back to the confidence
/// based score when a result carries no such field.
#[derive(Debug, Clone, Copy, Default)]
pub struct PayloadScorer;

impl CriterionScorer for PayloadScorer {
    fn score(&self, criterion: &RubricCriterion, results: &[&WorkerResult]) -> f64 {
        if results.is_empty() {
            return 0.0;
        }
        let total: f64 = results
            .iter()
            .map(|r| {
                r.payload
                    .get("scores")
                    .and_then(|s| s.get(&criterion.criterion))
                    .and_then(|v| v.as_f64())
                    .unwrap_or(r.confidence * MAX_SCORE)
            })
            .sum();
        total / results.len() as f64
    }
}
