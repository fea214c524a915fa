//! Iteration value objects

use crate::feedback::Resolution;
use crate::quality::QualityScore;
use serde::{Deserialize, Serialize};

/// What the next attempt needs to know about the failed one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationContext {
    /// Phase whose gate failed
    pub source_phase: String,
    pub source_attempt: u32,
    /// Phase to re-enter (the source phase or an earlier one)
    pub target_phase: String,
    pub failed_criteria: Vec<String>,
    pub resolved_conflicts: Vec<Resolution>,
    /// Subjects still waiting on a manual decision
    pub unresolved_subjects: Vec<String>,
    pub prior_score: QualityScore,
    pub reason: String,
}

/// Router output for a re-entry
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingDecision {
    pub target_phase: String,
    pub target_index: usize,
    /// Re-entry count of the target phase after this decision (1-based)
    pub iteration: u32,
    pub context: IterationContext,
}

/// Link from a failed phase run to the attempt that follows it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    pub from_phase: String,
    pub from_attempt: u32,
    pub to_phase: String,
    pub iteration: u32,
    pub context: IterationContext,
}

impl IterationRecord {
    pub fn from_decision(decision: &RoutingDecision) -> Self {
        Self {
            from_phase: decision.context.source_phase.clone(),
            from_attempt: decision.context.source_attempt,
            to_phase: decision.target_phase.clone(),
            iteration: decision.iteration,
            context: decision.context.clone(),
        }
    }

    /// Whether the run went back to an earlier phase
    pub fn is_backtrack(&self) -> bool {
        self.from_phase != self.to_phase
    }
}
