//! Domain error types

use crate::workflow::validation::DefinitionIssue;
use thiserror::Error;

/// Orchestration error taxonomy
///
/// Task-level variants ([`WorkerTimeout`](Self::WorkerTimeout),
/// [`WorkerFailure`](Self::WorkerFailure)) are absorbed by the dispatcher and
/// turned into scored results. Only [`is_fatal`](Self::is_fatal) variants
/// terminate a run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrchestrationError {
    #[error("Invalid workflow definition: {}", summarize(.0))]
    InvalidDefinition(Vec<DefinitionIssue>),

    #[error("Unknown capability: {0}")]
    UnknownCapability(String),

    #[error("Worker timed out")]
    WorkerTimeout,

    #[error("Worker failed: {0}")]
    WorkerFailure(String),

    #[error("Quality gate not passed for phase '{0}'")]
    GateFailure(String),

    #[error("Iteration limit exceeded for phase '{phase}' (max {max_iterations})")]
    IterationLimitExceeded { phase: String, max_iterations: u32 },

    #[error("Conflict on subject '{subject}' needs a manual decision")]
    ConflictUnresolvable { subject: String },

    #[error("Run cancelled by user")]
    UserCancelled,
}

impl OrchestrationError {
    /// Whether this error terminates the run it occurs in
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            OrchestrationError::InvalidDefinition(_)
                | OrchestrationError::UnknownCapability(_)
                | OrchestrationError::IterationLimitExceeded { .. }
                | OrchestrationError::UserCancelled
        )
    }

    /// Check if this error represents a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, OrchestrationError::UserCancelled)
    }
}

fn summarize(issues: &[DefinitionIssue]) -> String {
    issues
        .iter()
        .map(|i| i.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}
