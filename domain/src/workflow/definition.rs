//! Workflow definition entities
//!
//! A [`WorkflowDefinition`] is the static, ordered list of [`PhaseSpec`]s a run
//! walks through. It is immutable once a run starts: runs hold it behind an
//! `Arc` and never hand out mutable access.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tolerance used when checking that rubric weights sum to 1.0
pub const WEIGHT_EPSILON: f64 = 1e-6;

/// One weighted criterion of a phase's quality rubric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RubricCriterion {
    /// Criterion name (e.g. "coverage", "visual-identity")
    pub criterion: String,
    /// Weight of this criterion in the aggregate (all weights sum to 1.0)
    pub weight: f64,
    /// Capabilities whose results feed this criterion; empty means all results
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl RubricCriterion {
    pub fn new(criterion: impl Into<String>, weight: f64) -> Self {
        Self {
            criterion: criterion.into(),
            weight,
            capabilities: Vec::new(),
        }
    }

    /// Restrict the criterion to results of the given capabilities
    pub fn scoring(mut self, capabilities: &[&str]) -> Self {
        self.capabilities = capabilities.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Whether a result produced for `capability` feeds this criterion
    pub fn covers(&self, capability: &str) -> bool {
        self.capabilities.is_empty() || self.capabilities.iter().any(|c| c == capability)
    }
}

/// Static description of one phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseSpec {
    /// Unique phase name
    pub name: String,
    /// Required capability tags, in declaration order
    pub capabilities: Vec<String>,
    /// Quality rubric
    pub rubric: Vec<RubricCriterion>,
    /// How many times this phase may be re-entered after a gate failure
    pub max_iterations: u32,
    /// Whether the phase's tasks run concurrently
    pub concurrent: bool,
    /// Number of tasks (variants) dispatched per capability
    pub fan_out: u32,
    /// Failed criterion -> phase to re-enter instead of this one
    pub reentry_map: BTreeMap<String, String>,
}

impl PhaseSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capabilities: Vec::new(),
            rubric: Vec::new(),
            max_iterations: 0,
            concurrent: true,
            fan_out: 1,
            reentry_map: BTreeMap::new(),
        }
    }

    // ==================== Builder Methods ====================

    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        let capability = capability.into();
        if !self.capabilities.contains(&capability) {
            self.capabilities.push(capability);
        }
        self
    }

    pub fn with_criterion(mut self, criterion: RubricCriterion) -> Self {
        self.rubric.push(criterion);
        self
    }

    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn sequential(mut self) -> Self {
        self.concurrent = false;
        self
    }

    pub fn with_fan_out(mut self, fan_out: u32) -> Self {
        self.fan_out = fan_out;
        self
    }

    pub fn with_reentry(mut self, criterion: impl Into<String>, phase: impl Into<String>) -> Self {
        self.reentry_map.insert(criterion.into(), phase.into());
        self
    }

    /// Sum of all rubric weights
    pub fn total_weight(&self) -> f64 {
        self.rubric.iter().map(|c| c.weight).sum()
    }

    pub fn criterion(&self, name: &str) -> Option<&RubricCriterion> {
        self.rubric.iter().find(|c| c.criterion == name)
    }
}

/// Ordered sequence of phases
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub name: String,
    pub phases: Vec<PhaseSpec>,
}

impl WorkflowDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phases: Vec::new(),
        }
    }

    pub fn with_phase(mut self, phase: PhaseSpec) -> Self {
        self.phases.push(phase);
        self
    }

    pub fn phase(&self, name: &str) -> Option<&PhaseSpec> {
        self.phases.iter().find(|p| p.name == name)
    }

    pub fn phase_index(&self, name: &str) -> Option<usize> {
        self.phases.iter().position(|p| p.name == name)
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    /// All capability tags referenced by any phase, deduplicated, in first-use order
    pub fn required_capabilities(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for cap in self.phases.iter().flat_map(|p| p.capabilities.iter()) {
            if !seen.contains(&cap.as_str()) {
                seen.push(cap.as_str());
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn discovery() -> PhaseSpec {
        PhaseSpec::new("discovery")
            .with_capability("research")
            .with_capability("persona")
            .with_criterion(RubricCriterion::new("coverage", 0.7).scoring(&["research"]))
            .with_criterion(RubricCriterion::new("clarity", 0.3))
            .with_max_iterations(2)
    }

    #[test]
    fn test_phase_builder_dedups_capabilities() {
        let phase = PhaseSpec::new("p")
            .with_capability("a")
            .with_capability("b")
            .with_capability("a");
        assert_eq!(phase.capabilities, vec!["a", "b"]);
    }

    #[test]
    fn test_total_weight() {
        assert!((discovery().total_weight() - 1.0).abs() < WEIGHT_EPSILON);
    }

    #[test]
    fn test_criterion_coverage() {
        let phase = discovery();
        let coverage = phase.criterion("coverage").unwrap();
        assert!(coverage.covers("research"));
        assert!(!coverage.covers("persona"));

        let clarity = phase.criterion("clarity").unwrap();
        assert!(clarity.covers("persona"));
        assert!(clarity.covers("anything"));
    }

    #[test]
    fn test_phase_lookup() {
        let def = WorkflowDefinition::new("sprint")
            .with_phase(discovery())
            .with_phase(PhaseSpec::new("design").with_capability("research"));
        assert_eq!(def.phase_index("design"), Some(1));
        assert!(def.phase("missing").is_none());
        assert_eq!(def.required_capabilities(), vec!["research", "persona"]);
    }
}
