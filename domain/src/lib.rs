//! Domain layer for phasegate
//!
//! This crate contains the pure core of the orchestrator: workflow
//! definitions and runs, tasks and results, quality gating, conflict
//! resolution, feedback routing and the audit trail. Nothing in here performs
//! I/O or spawns tasks; the application layer drives these types.
//!
//! # Core Concepts
//!
//! ## Phases and gates
//!
//! A [`WorkflowDefinition`] is an ordered list of [`PhaseSpec`]s. Each phase
//! run is scored against its rubric by the [`QualityGate`], which yields one
//! of three verdicts:
//!
//! - **Pass**: advance to the next phase
//! - **Iterate**: the [`FeedbackRouter`] picks a phase to re-enter (bounded
//!   by that phase's `max_iterations`)
//! - **Fail**: abort the run
//!
//! ## Feedback
//!
//! Workers and external reviewers attach [`FeedbackItem`]s to subjects. When
//! items disagree, the [`ConflictResolver`] settles them by veto, weighted
//! vote, and finally a [`TieBreak`] rule.

pub mod audit;
pub mod core;
pub mod feedback;
pub mod quality;
pub mod routing;
pub mod task;
pub mod workflow;

pub use audit::{AuditEntry, AuditLog, DecisionKind};
pub use core::{
    error::OrchestrationError,
    ids::{RunId, TaskId},
};
pub use feedback::{
    ConflictOutcome, ConflictRecord, ConflictResolver, FeedbackAction, FeedbackItem,
    FeedbackSeverity, Resolution, ResolverConfig, TieBreak,
};
pub use quality::{
    ConfidenceScorer, CriterionScore, CriterionScorer, GateEvaluation, GatePolicy, PayloadScorer,
    QualityGate, QualityScore, Verdict,
};
pub use routing::{FeedbackRouter, IterationContext, IterationCounts, IterationRecord, RoutingDecision};
pub use task::{Task, TaskContext, WorkerError, WorkerOutput, WorkerResult};
pub use workflow::{
    DefinitionIssue, DefinitionIssueCode, PhaseMetrics, PhaseRun, PhaseRunSealed, PhaseSpec,
    RubricCriterion, RunMetrics, RunOutcome, RunReport, RunState, RunStatusView, Severity,
    TaskOutcome, TaskTotals, WorkflowDefinition, WorkflowRun, has_errors,
};
