//! Feedback router
//!
//! Decides where an `Iterate` verdict sends the run next and whether both the
//! failing phase and the re-entry target still have iteration budget left.

use super::iteration::{IterationContext, RoutingDecision};
use crate::core::error::OrchestrationError;
use crate::feedback::ConflictRecord;
use crate::quality::GateEvaluation;
use crate::workflow::definition::{PhaseSpec, WorkflowDefinition};
use std::collections::BTreeMap;

/// Iterations charged to each phase since it last passed
///
/// A re-entry charges the failing phase and, on a backtrack, the target phase
/// as well. A phase's count is cleared when it passes.
pub type IterationCounts = BTreeMap<String, u32>;

#[derive(Debug, Clone, Copy, Default)]
pub struct FeedbackRouter;

impl FeedbackRouter {
    /// Route an `Iterate` verdict of `definition.phases[phase_index]`.
    ///
    /// Each failed criterion maps to its re-entry target (the current phase
    /// when the definition names none); the earliest target wins. The failing
    /// phase's own budget is checked first, then the target's.
    pub fn route(
        &self,
        definition: &WorkflowDefinition,
        phase_index: usize,
        attempt: u32,
        evaluation: &GateEvaluation,
        conflicts: &[ConflictRecord],
        counts: &IterationCounts,
    ) -> Result<RoutingDecision, OrchestrationError> {
        let current = &definition.phases[phase_index];
        check_budget(current, counts)?;

        let target_index = evaluation
            .failed_criteria
            .iter()
            .filter_map(|criterion| current.reentry_map.get(criterion))
            .filter_map(|target| definition.phase_index(target))
            .filter(|index| *index <= phase_index)
            .min()
            .unwrap_or(phase_index);
        let target = &definition.phases[target_index];
        let used = check_budget(target, counts)?;

        let context = IterationContext {
            source_phase: current.name.clone(),
            source_attempt: attempt,
            target_phase: target.name.clone(),
            failed_criteria: evaluation.failed_criteria.clone(),
            resolved_conflicts: conflicts
                .iter()
                .filter_map(|c| c.outcome.resolution().cloned())
                .collect(),
            unresolved_subjects: conflicts
                .iter()
                .filter(|c| !c.is_resolved())
                .map(|c| c.subject.clone())
                .collect(),
            prior_score: evaluation.score.clone(),
            reason: evaluation.reason.clone(),
        };

        Ok(RoutingDecision {
            target_phase: target.name.clone(),
            target_index,
            iteration: used + 1,
            context,
        })
    }
}

/// Iterations already charged to `phase`, or the limit error when none remain
fn check_budget(phase: &PhaseSpec, counts: &IterationCounts) -> Result<u32, OrchestrationError> {
    let used = counts.get(&phase.name).copied().unwrap_or(0);
    if used >= phase.max_iterations {
        return Err(OrchestrationError::IterationLimitExceeded {
            phase: phase.name.clone(),
            max_iterations: phase.max_iterations,
        });
    }
    Ok(used)
}
