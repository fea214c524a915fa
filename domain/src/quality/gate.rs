//! Quality gate
//!
//! [`QualityGate::evaluate`] is a pure function of (rubric, results, scorer):
//! identical inputs always give an identical [`GateEvaluation`].

use super::score::{CriterionScore, MAX_SCORE, QualityScore};
use super::scorer::CriterionScorer;
use crate::task::WorkerResult;
use crate::workflow::definition::RubricCriterion;
use serde::{Deserialize, Serialize};

/// Gate decision for one phase attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Iterate,
    Fail,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Pass => "pass",
            Verdict::Iterate => "iterate",
            Verdict::Fail => "fail",
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Gate thresholds, all on the 0–5 scale
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GatePolicy {
    /// Minimum aggregate for Pass
    pub pass_threshold: f64,
    /// Every criterion must reach this for Pass
    pub hard_floor: f64,
    /// Aggregates at or below this Fail outright
    pub abort_floor: f64,
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self {
            pass_threshold: 3.5,
            hard_floor: 2.0,
            abort_floor: 1.5,
        }
    }
}

impl GatePolicy {
    pub fn with_pass_threshold(mut self, threshold: f64) -> Self {
        self.pass_threshold = threshold;
        self
    }

    pub fn with_hard_floor(mut self, floor: f64) -> Self {
        self.hard_floor = floor;
        self
    }

    pub fn with_abort_floor(mut self, floor: f64) -> Self {
        self.abort_floor = floor;
        self
    }

    /// Check the thresholds are ordered and in range
    pub fn validate(&self) -> Result<(), String> {
        let in_range = |v: f64| (0.0..=MAX_SCORE).contains(&v);
        if !in_range(self.pass_threshold) || !in_range(self.hard_floor) || !in_range(self.abort_floor)
        {
            return Err(format!("gate thresholds must lie within 0..={}", MAX_SCORE));
        }
        if self.abort_floor >= self.pass_threshold {
            return Err(format!(
                "abort floor {} must be below pass threshold {}",
                self.abort_floor, self.pass_threshold
            ));
        }
        Ok(())
    }
}

/// Result of running the gate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateEvaluation {
    pub score: QualityScore,
    pub verdict: Verdict,
    /// Criteria that kept the phase from passing
    pub failed_criteria: Vec<String>,
    pub reason: String,
}

impl GateEvaluation {
    /// Downgrade a Pass to Iterate (e.g. an open conflict needs a decision)
    pub fn hold(&mut self, reason: impl Into<String>) {
        if self.verdict.is_pass() {
            self.verdict = Verdict::Iterate;
            self.reason = reason.into();
        }
    }
}

/// Scores collected results against a rubric and decides Pass/Iterate/Fail
#[derive(Debug, Clone, Copy, Default)]
pub struct QualityGate {
    policy: GatePolicy,
}

impl QualityGate {
    pub fn new(policy: GatePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &GatePolicy {
        &self.policy
    }

    pub fn evaluate(
        &self,
        rubric: &[RubricCriterion],
        results: &[WorkerResult],
        scorer: &dyn CriterionScorer,
    ) -> GateEvaluation {
        let criteria = rubric
            .iter()
            .map(|criterion| Self::score_criterion(criterion, results, scorer))
            .collect();
        let score = QualityScore::from_criteria(criteria);
        self.decide(score)
    }

    fn score_criterion(
        criterion: &RubricCriterion,
        results: &[WorkerResult],
        scorer: &dyn CriterionScorer,
    ) -> CriterionScore {
        let matching: Vec<&WorkerResult> = results
            .iter()
            .filter(|r| criterion.covers(&r.capability))
            .collect();

        let forced_zero = matching.iter().any(|r| r.error.is_some());
        let score = if forced_zero || matching.is_empty() {
            0.0
        } else {
            let raw = scorer.score(criterion, &matching);
            if raw.is_finite() {
                raw.clamp(0.0, MAX_SCORE)
            } else {
                0.0
            }
        };

        CriterionScore {
            criterion: criterion.criterion.clone(),
            weight: criterion.weight,
            score,
            forced_zero,
        }
    }

    fn decide(&self, score: QualityScore) -> GateEvaluation {
        let aggregate = score.aggregate();
        let below_floor: Vec<String> = score
            .below(self.policy.hard_floor)
            .map(|c| c.criterion.clone())
            .collect();

        if aggregate >= self.policy.pass_threshold && below_floor.is_empty() {
            return GateEvaluation {
                reason: format!(
                    "aggregate {:.2} meets threshold {:.2}",
                    aggregate, self.policy.pass_threshold
                ),
                score,
                verdict: Verdict::Pass,
                failed_criteria: Vec::new(),
            };
        }

        let failed_criteria: Vec<String> = if aggregate < self.policy.pass_threshold {
            score
                .below(self.policy.pass_threshold)
                .map(|c| c.criterion.clone())
                .collect()
        } else {
            below_floor.clone()
        };

        if aggregate <= self.policy.abort_floor {
            return GateEvaluation {
                reason: format!(
                    "aggregate {:.2} at or below abort floor {:.2}",
                    aggregate, self.policy.abort_floor
                ),
                score,
                verdict: Verdict::Fail,
                failed_criteria,
            };
        }

        let reason = if below_floor.is_empty() {
            format!(
                "aggregate {:.2} below threshold {:.2}",
                aggregate, self.policy.pass_threshold
            )
        } else {
            format!(
                "aggregate {:.2}; below hard floor {:.2}: {}",
                aggregate,
                self.policy.hard_floor,
                below_floor.join(", ")
            )
        };

        GateEvaluation {
            score,
            verdict: Verdict::Iterate,
            failed_criteria,
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ids::TaskId;
    use crate::quality::scorer::ConfidenceScorer;
    use crate::task::{WorkerError, WorkerOutput};
    use serde_json::Value;

    fn ok(capability: &str, confidence: f64) -> WorkerResult {
        WorkerResult::success(
            TaskId::new(capability, 0),
            capability,
            "w",
            WorkerOutput::new(Value::Null, confidence),
            1,
        )
    }

    fn timed_out(capability: &str) -> WorkerResult {
        WorkerResult::failed(
            TaskId::new(capability, 0),
            capability,
            "w",
            WorkerError::Timeout,
            2,
        )
    }

    fn rubric_single() -> Vec<RubricCriterion> {
        vec![RubricCriterion::new("quality", 1.0)]
    }

    fn rubric_split() -> Vec<RubricCriterion> {
        vec![
            RubricCriterion::new("visual", 0.5).scoring(&["visual"]),
            RubricCriterion::new("copy", 0.5).scoring(&["copy"]),
        ]
    }

    #[test]
    fn test_full_confidence_passes() {
        let eval =
            QualityGate::default().evaluate(&rubric_single(), &[ok("a", 1.0)], &ConfidenceScorer);
        assert_eq!(eval.verdict, Verdict::Pass);
        assert!((eval.score.aggregate() - 5.0).abs() < 1e-9);
        assert!(eval.failed_criteria.is_empty());
    }

    #[test]
    fn test_between_floors_iterates() {
        // 0.4 * 5 = 2.0: below 3.5, above 1.5
        let eval =
            QualityGate::default().evaluate(&rubric_single(), &[ok("a", 0.4)], &ConfidenceScorer);
        assert_eq!(eval.verdict, Verdict::Iterate);
        assert_eq!(eval.failed_criteria, vec!["quality"]);
    }

    #[test]
    fn test_at_abort_floor_fails() {
        // 0.3 * 5 = 1.5
        let eval =
            QualityGate::default().evaluate(&rubric_single(), &[ok("a", 0.3)], &ConfidenceScorer);
        assert_eq!(eval.verdict, Verdict::Fail);
    }

    #[test]
    fn test_hard_floor_blocks_pass_despite_high_aggregate() {
        let rubric = vec![
            RubricCriterion::new("visual", 0.8).scoring(&["visual"]),
            RubricCriterion::new("copy", 0.2).scoring(&["copy"]),
        ];
        // aggregate = 0.8 * 5 + 0.2 * 1 = 4.2, copy = 1.0 < 2.0
        let eval = QualityGate::default().evaluate(
            &rubric,
            &[ok("visual", 1.0), ok("copy", 0.2)],
            &ConfidenceScorer,
        );
        assert_eq!(eval.verdict, Verdict::Iterate);
        assert_eq!(eval.failed_criteria, vec!["copy"]);
    }

    #[test]
    fn test_errored_result_forces_criterion_to_zero() {
        let eval = QualityGate::default().evaluate(
            &rubric_split(),
            &[ok("visual", 1.0), timed_out("copy")],
            &ConfidenceScorer,
        );
        assert_ne!(eval.verdict, Verdict::Pass);
        let copy = eval.score.get("copy").unwrap();
        assert_eq!(copy.score, 0.0);
        assert!(copy.forced_zero);
        assert_eq!(eval.score.get("visual").unwrap().score, 5.0);
    }

    #[test]
    fn test_one_error_among_many_successes_still_zeroes() {
        let eval = QualityGate::default().evaluate(
            &rubric_single(),
            &[ok("a", 1.0), ok("b", 1.0), timed_out("c")],
            &ConfidenceScorer,
        );
        assert_eq!(eval.score.aggregate(), 0.0);
        assert_eq!(eval.verdict, Verdict::Fail);
    }

    #[test]
    fn test_criterion_without_results_scores_zero() {
        let eval = QualityGate::default().evaluate(
            &rubric_split(),
            &[ok("visual", 1.0)],
            &ConfidenceScorer,
        );
        assert_eq!(eval.score.get("copy").unwrap().score, 0.0);
        assert!(!eval.score.get("copy").unwrap().forced_zero);
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let gate = QualityGate::default();
        let results = vec![ok("visual", 0.9), ok("copy", 0.55)];
        let first = gate.evaluate(&rubric_split(), &results, &ConfidenceScorer);
        let second = gate.evaluate(&rubric_split(), &results, &ConfidenceScorer);
        assert_eq!(first, second);
    }

    #[test]
    fn test_hold_downgrades_only_pass() {
        let mut eval =
            QualityGate::default().evaluate(&rubric_single(), &[ok("a", 1.0)], &ConfidenceScorer);
        eval.hold("open conflict");
        assert_eq!(eval.verdict, Verdict::Iterate);
        assert_eq!(eval.reason, "open conflict");

        let mut failing =
            QualityGate::default().evaluate(&rubric_single(), &[ok("a", 0.1)], &ConfidenceScorer);
        failing.hold("open conflict");
        assert_eq!(failing.verdict, Verdict::Fail);
    }

    #[test]
    fn test_policy_validation() {
        assert!(GatePolicy::default().validate().is_ok());
        assert!(GatePolicy::default().with_abort_floor(4.0).validate().is_err());
        assert!(GatePolicy::default().with_pass_threshold(7.0).validate().is_err());
    }
}
