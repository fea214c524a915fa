//! Application layer for phasegate
//!
//! This crate contains use cases, port definitions, the worker registry and
//! application configuration. It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod registry;
pub mod use_cases;

// Re-export commonly used types
pub use config::{DispatchMode, DispatchParams, RunSettings};
pub use ports::{
    manual_decision::{
        DeferDecision, FixedDecision, ManualDecision, ManualDecisionError, ManualDecisionPort,
    },
    progress::{NoProgress, ProgressNotifier},
    run_recorder::{NoRunRecorder, RunEvent, RunRecorder},
    worker::Worker,
};
pub use registry::WorkerRegistry;
pub use use_cases::control::{ControlError, StartError, WorkflowService};
pub use use_cases::dispatch_phase::PhaseDispatcher;
pub use use_cases::run_workflow::{FeedbackSubmission, RunWorkflowInput, RunWorkflowUseCase};
