//! Quality score value objects

use serde::{Deserialize, Serialize};

/// Highest score a criterion can receive
pub const MAX_SCORE: f64 = 5.0;

/// Score of one rubric criterion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionScore {
    pub criterion: String,
    pub weight: f64,
    /// Score in [0, 5]
    pub score: f64,
    /// Set when an errored result forced the score to 0
    pub forced_zero: bool,
}

impl CriterionScore {
    pub fn weighted(&self) -> f64 {
        self.weight * self.score
    }
}

/// Per-criterion scores plus their weighted aggregate
///
/// Derived from results; only [`QualityScore::from_criteria`] builds one, so
/// the aggregate always matches the criteria it was computed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityScore {
    criteria: Vec<CriterionScore>,
    aggregate: f64,
}

impl QualityScore {
    pub fn from_criteria(criteria: Vec<CriterionScore>) -> Self {
        let aggregate = criteria.iter().map(CriterionScore::weighted).sum();
        Self {
            criteria,
            aggregate,
        }
    }

    pub fn aggregate(&self) -> f64 {
        self.aggregate
    }

    pub fn criteria(&self) -> &[CriterionScore] {
        &self.criteria
    }

    pub fn get(&self, criterion: &str) -> Option<&CriterionScore> {
        self.criteria.iter().find(|c| c.criterion == criterion)
    }

    /// Criteria scoring strictly below `floor`
    pub fn below(&self, floor: f64) -> impl Iterator<Item = &CriterionScore> {
        self.criteria.iter().filter(move |c| c.score < floor)
    }

    /// Compact summary (e.g., "3.80/5 [quality 4.0, reach 3.5]")
    pub fn summary(&self) -> String {
        let parts = self
            .criteria
            .iter()
            .map(|c| format!("{} {:.1}", c.criterion, c.score))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{:.2}/{} [{}]", self.aggregate, MAX_SCORE, parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(name: &str, weight: f64, score: f64) -> CriterionScore {
        CriterionScore {
            criterion: name.to_string(),
            weight,
            score,
            forced_zero: false,
        }
    }

    #[test]
    fn test_aggregate_is_weighted_sum() {
        let q = QualityScore::from_criteria(vec![score("a", 0.6, 5.0), score("b", 0.4, 2.5)]);
        assert!((q.aggregate() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_below_floor() {
        let q = QualityScore::from_criteria(vec![score("a", 0.5, 5.0), score("b", 0.5, 1.0)]);
        let low: Vec<_> = q.below(2.0).map(|c| c.criterion.as_str()).collect();
        assert_eq!(low, vec!["b"]);
    }

    #[test]
    fn test_summary() {
        let q = QualityScore::from_criteria(vec![score("quality", 1.0, 4.0)]);
        assert_eq!(q.summary(), "4.00/5 [quality 4.0]");
    }
}
