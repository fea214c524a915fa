//! Workflow definitions and runs

pub mod definition;
pub mod metrics;
pub mod run;
pub mod validation;

pub use definition::{PhaseSpec, RubricCriterion, WEIGHT_EPSILON, WorkflowDefinition};
pub use metrics::{PhaseMetrics, RunMetrics, TaskTotals};
pub use run::{
    PhaseRun, PhaseRunSealed, RunOutcome, RunReport, RunState, RunStatusView, TaskOutcome,
    WorkflowRun,
};
pub use validation::{DefinitionIssue, DefinitionIssueCode, Severity, has_errors};
