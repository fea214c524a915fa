//! Workflow control service
//!
//! The external control surface: start runs, query their status, submit
//! out-of-band feedback, cancel, and wait for the final report. Each run is
//! driven by its own tokio task; the service only keeps the handles needed to
//! talk to it.

use crate::ports::progress::{NoProgress, ProgressNotifier};
use crate::use_cases::run_workflow::{FeedbackSubmission, RunWorkflowInput, RunWorkflowUseCase};
use phasegate_domain::{
    DefinitionIssue, FeedbackItem, RunId, RunReport, RunState, RunStatusView, WorkflowDefinition,
    has_errors,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Why a run could not be started
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StartError {
    #[error("project id must not be empty")]
    EmptyProjectId,

    #[error("invalid workflow definition ({} issue(s))", .0.len())]
    InvalidDefinition(Vec<DefinitionIssue>),
}

/// Errors from status/feedback/cancel/wait calls
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControlError {
    #[error("unknown run: {0}")]
    UnknownRun(RunId),

    #[error("run {0} has already finished")]
    RunFinished(RunId),

    #[error("phase '{phase}' is not part of run {run_id}")]
    UnknownPhase { run_id: RunId, phase: String },

    #[error("run {0} is already being awaited")]
    AlreadyAwaited(RunId),

    #[error("run {0} is still running")]
    StillRunning(RunId),

    #[error("run task failed: {0}")]
    Join(String),
}

struct RunHandle {
    definition: Arc<WorkflowDefinition>,
    cancellation: CancellationToken,
    feedback: mpsc::UnboundedSender<FeedbackSubmission>,
    status: watch::Receiver<RunStatusView>,
    task: Option<JoinHandle<RunReport>>,
    report: Option<RunReport>,
}

/// Starts and tracks workflow runs
pub struct WorkflowService {
    use_case: Arc<RunWorkflowUseCase>,
    progress: Arc<dyn ProgressNotifier>,
    runs: Mutex<HashMap<RunId, RunHandle>>,
}

impl WorkflowService {
    pub fn new(use_case: Arc<RunWorkflowUseCase>) -> Self {
        Self {
            use_case,
            progress: Arc::new(NoProgress),
            runs: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressNotifier>) -> Self {
        self.progress = progress;
        self
    }

    fn runs(&self) -> MutexGuard<'_, HashMap<RunId, RunHandle>> {
        self.runs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Validate `definition` and start running it in the background.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        &self,
        project_id: impl Into<String>,
        definition: WorkflowDefinition,
    ) -> Result<RunId, StartError> {
        let project_id = project_id.into();
        if project_id.trim().is_empty() {
            return Err(StartError::EmptyProjectId);
        }
        let registry = self.use_case.registry();
        let issues = definition.validate_against(|capability| registry.contains(capability));
        if has_errors(&issues) {
            return Err(StartError::InvalidDefinition(issues));
        }

        let definition = Arc::new(definition);
        let run_id = RunId::new();
        let cancellation = CancellationToken::new();
        let (feedback_tx, feedback_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(RunStatusView {
            run_id,
            state: RunState::Pending,
            phase: None,
            attempt: None,
            verdict: None,
            last_score: None,
        });

        let input = RunWorkflowInput::new(project_id, Arc::clone(&definition))
            .with_run_id(run_id)
            .with_cancellation(cancellation.clone())
            .with_feedback(feedback_rx)
            .with_status(status_tx);
        let use_case = Arc::clone(&self.use_case);
        let progress = Arc::clone(&self.progress);
        let task = tokio::spawn(async move { use_case.execute(input, progress.as_ref()).await });

        info!("Started run {} of '{}'", run_id, definition.name);
        self.runs().insert(
            run_id,
            RunHandle {
                definition,
                cancellation,
                feedback: feedback_tx,
                status: status_rx,
                task: Some(task),
                report: None,
            },
        );
        Ok(run_id)
    }

    /// Latest status snapshot, or `None` for an unknown run
    pub fn status(&self, run_id: RunId) -> Option<RunStatusView> {
        self.runs()
            .get(&run_id)
            .map(|handle| handle.status.borrow().clone())
    }

    /// Queue feedback for the next evaluation of `phase`
    pub fn submit_feedback(
        &self,
        run_id: RunId,
        phase: &str,
        items: Vec<FeedbackItem>,
    ) -> Result<(), ControlError> {
        let runs = self.runs();
        let handle = runs.get(&run_id).ok_or(ControlError::UnknownRun(run_id))?;
        if handle.definition.phase(phase).is_none() {
            return Err(ControlError::UnknownPhase {
                run_id,
                phase: phase.to_string(),
            });
        }
        if handle.status.borrow().state.is_terminal() {
            return Err(ControlError::RunFinished(run_id));
        }
        debug!("{} feedback item(s) queued for '{}'", items.len(), phase);
        handle
            .feedback
            .send((phase.to_string(), items))
            .map_err(|_| ControlError::RunFinished(run_id))
    }

    /// Request cancellation. The run stops at its next transition.
    pub fn cancel(&self, run_id: RunId) -> Result<(), ControlError> {
        let runs = self.runs();
        let handle = runs.get(&run_id).ok_or(ControlError::UnknownRun(run_id))?;
        if handle.status.borrow().state.is_terminal() {
            return Err(ControlError::RunFinished(run_id));
        }
        info!("Cancelling run {}", run_id);
        handle.cancellation.cancel();
        Ok(())
    }

    /// Wait for the run to finish and return its report
    pub async fn wait(&self, run_id: RunId) -> Result<RunReport, ControlError> {
        let task = {
            let mut runs = self.runs();
            let handle = runs
                .get_mut(&run_id)
                .ok_or(ControlError::UnknownRun(run_id))?;
            if let Some(report) = &handle.report {
                return Ok(report.clone());
            }
            handle
                .task
                .take()
                .ok_or(ControlError::AlreadyAwaited(run_id))?
        };

        let report = task.await.map_err(|e| ControlError::Join(e.to_string()))?;
        if let Some(handle) = self.runs().get_mut(&run_id) {
            handle.report = Some(report.clone());
        }
        Ok(report)
    }

    /// Drop a finished run, returning its report if it was awaited.
    ///
    /// Afterwards the run is unknown to every other operation.
    pub fn forget(&self, run_id: RunId) -> Result<Option<RunReport>, ControlError> {
        let mut runs = self.runs();
        let handle = runs.get(&run_id).ok_or(ControlError::UnknownRun(run_id))?;
        let finished = handle.report.is_some()
            || handle.task.as_ref().is_some_and(|task| task.is_finished());
        if !finished {
            return Err(ControlError::StillRunning(run_id));
        }
        debug!("Forgetting run {}", run_id);
        Ok(runs.remove(&run_id).and_then(|handle| handle.report))
    }

    /// Ids of every run this service has not forgotten
    pub fn run_ids(&self) -> Vec<RunId> {
        let mut ids: Vec<RunId> = self.runs().keys().copied().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunSettings;
    use crate::ports::worker::Worker;
    use crate::registry::WorkerRegistry;
    use async_trait::async_trait;
    use phasegate_domain::{
        PhaseSpec, RubricCriterion, RunOutcome, Task, WorkerError, WorkerOutput,
    };
    use serde_json::Value;
    use std::time::Duration;

    struct Slow(Duration);

    #[async_trait]
    impl Worker for Slow {
        fn name(&self) -> &str {
            "slow"
        }
        fn capability(&self) -> &str {
            "a"
        }
        async fn process(&self, _task: Task) -> Result<WorkerOutput, WorkerError> {
            tokio::time::sleep(self.0).await;
            Ok(WorkerOutput::new(Value::Null, 0.9))
        }
    }

    fn service(delay: Duration) -> WorkflowService {
        let registry = WorkerRegistry::new().with_worker(Arc::new(Slow(delay)));
        WorkflowService::new(Arc::new(RunWorkflowUseCase::new(
            Arc::new(registry),
            RunSettings::default(),
        )))
    }

    fn definition() -> WorkflowDefinition {
        WorkflowDefinition::new("w")
            .with_phase(
                PhaseSpec::new("one")
                    .with_capability("a")
                    .with_criterion(RubricCriterion::new("q", 1.0)),
            )
            .with_phase(
                PhaseSpec::new("two")
                    .with_capability("a")
                    .with_criterion(RubricCriterion::new("q", 1.0)),
            )
    }

    #[tokio::test]
    async fn test_start_and_wait() {
        let service = service(Duration::from_millis(1));
        let run_id = service.start("proj", definition()).unwrap();
        let report = service.wait(run_id).await.unwrap();
        assert_eq!(report.run_id, run_id);
        assert_eq!(report.outcome(), Some(RunOutcome::Completed));
        assert_eq!(
            service.status(run_id).map(|s| s.state),
            Some(RunState::Completed)
        );
        // a finished run can be awaited again
        assert_eq!(service.wait(run_id).await.unwrap().run_id, run_id);
    }

    #[tokio::test]
    async fn test_start_rejects_invalid_definition() {
        let service = service(Duration::from_millis(1));
        let err = service
            .start("proj", WorkflowDefinition::new("empty"))
            .unwrap_err();
        assert!(matches!(err, StartError::InvalidDefinition(issues) if !issues.is_empty()));
        assert_eq!(
            service.start("  ", definition()).unwrap_err(),
            StartError::EmptyProjectId
        );
        assert!(service.run_ids().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_aborts_with_user_cancelled() {
        let service = service(Duration::from_millis(200));
        let run_id = service.start("proj", definition()).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        service.cancel(run_id).unwrap();

        let report = service.wait(run_id).await.unwrap();
        assert_eq!(report.outcome(), Some(RunOutcome::UserCancelled));
        assert_eq!(report.exit_code(), 4);
        assert!(service.cancel(run_id).is_err());
    }

    #[tokio::test]
    async fn test_forget_releases_finished_run() {
        let service = service(Duration::from_millis(200));
        let run_id = service.start("proj", definition()).unwrap();
        assert!(matches!(
            service.forget(run_id),
            Err(ControlError::StillRunning(id)) if id == run_id
        ));

        let report = service.wait(run_id).await.unwrap();
        let forgotten = service.forget(run_id).unwrap();
        assert_eq!(forgotten.map(|r| r.run_id), Some(report.run_id));
        assert!(service.status(run_id).is_none());
        assert!(service.run_ids().is_empty());
        assert!(matches!(
            service.wait(run_id).await,
            Err(ControlError::UnknownRun(_))
        ));
        assert!(matches!(
            service.forget(run_id),
            Err(ControlError::UnknownRun(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_run_and_phase() {
        let service = service(Duration::from_millis(1));
        let ghost = RunId::new();
        assert!(service.status(ghost).is_none());
        assert_eq!(service.cancel(ghost), Err(ControlError::UnknownRun(ghost)));

        let run_id = service.start("proj", definition()).unwrap();
        assert!(matches!(
            service.submit_feedback(run_id, "nope", Vec::new()),
            Err(ControlError::UnknownPhase { .. })
        ));
        service.wait(run_id).await.unwrap();
    }
}
