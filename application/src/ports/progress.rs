//! Progress notification port
//!
//! Defines the interface for reporting progress during a workflow run.

use phasegate_domain::{GateEvaluation, IterationRecord, RunId, RunState, WorkerResult};

/// Callback for progress updates during a run
///
/// Implementations live in the presentation layer and can display
/// progress in various ways (progress bars, plain lines, nothing).
pub trait ProgressNotifier: Send + Sync {
    /// Called when a phase run starts
    fn on_phase_start(&self, phase: &str, attempt: u32, total_tasks: usize);

    /// Called when a task completes within a phase
    fn on_task_complete(&self, phase: &str, result: &WorkerResult);

    /// Called when the gate has judged a phase run
    fn on_phase_complete(&self, phase: &str, evaluation: &GateEvaluation);

    // ==================== Run Callbacks ====================

    /// Called once before the first phase
    fn on_run_start(&self, _run_id: RunId, _workflow: &str, _phases: usize) {}

    /// Called when a failed gate sends the run back to a phase
    fn on_iteration(&self, _record: &IterationRecord) {}

    /// Called once with the terminal state
    fn on_run_complete(&self, _state: &RunState) {}
}

/// No-op progress notifier for when progress reporting is not needed
pub struct NoProgress;

impl ProgressNotifier for NoProgress {
    fn on_phase_start(&self, _phase: &str, _attempt: u32, _total_tasks: usize) {}
    fn on_task_complete(&self, _phase: &str, _result: &WorkerResult) {}
    fn on_phase_complete(&self, _phase: &str, _evaluation: &GateEvaluation) {}
}
