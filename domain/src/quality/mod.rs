//! Quality gate: rubric scoring and verdicts

pub mod gate;
pub mod score;
pub mod scorer;

pub use gate::{GateEvaluation, GatePolicy, QualityGate, Verdict};
pub use score::{CriterionScore, MAX_SCORE, QualityScore};
pub use scorer::{ConfidenceScorer, CriterionScorer, PayloadScorer};
