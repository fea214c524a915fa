//! Workflow run entities
//!
//! A [`WorkflowRun`] is owned by exactly one orchestrator task. Other
//! components compute values from it; only the orchestrator mutates it.

use super::definition::WorkflowDefinition;
use super::metrics::RunMetrics;
use crate::audit::AuditLog;
use crate::core::ids::RunId;
use crate::feedback::ConflictRecord;
use crate::quality::{GateEvaluation, QualityScore, Verdict};
use crate::routing::{IterationCounts, IterationRecord};
use crate::task::{Task, WorkerResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Terminal outcome of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    QualityFailure,
    IterationLimitExceeded,
    InvalidDefinition,
    UserCancelled,
}

impl RunOutcome {
    /// Process exit code for this outcome
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Completed => 0,
            RunOutcome::QualityFailure => 1,
            RunOutcome::IterationLimitExceeded => 2,
            RunOutcome::InvalidDefinition => 3,
            RunOutcome::UserCancelled => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunOutcome::Completed => "completed",
            RunOutcome::QualityFailure => "quality_failure",
            RunOutcome::IterationLimitExceeded => "iteration_limit_exceeded",
            RunOutcome::InvalidDefinition => "invalid_definition",
            RunOutcome::UserCancelled => "user_cancelled",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Completed)
    }
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle state of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    Pending,
    Running { phase_index: usize, attempt: u32 },
    Completed,
    Aborted { outcome: RunOutcome, reason: String },
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Aborted { .. })
    }

    /// Terminal outcome, if the run has finished
    pub fn outcome(&self) -> Option<RunOutcome> {
        match self {
            RunState::Completed => Some(RunOutcome::Completed),
            RunState::Aborted { outcome, .. } => Some(*outcome),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RunState::Pending => "pending",
            RunState::Running { .. } => "running",
            RunState::Completed => "completed",
            RunState::Aborted { .. } => "aborted",
        }
    }
}

/// A dispatched task together with what came back for it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub task: Task,
    pub result: WorkerResult,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("phase run '{phase}' attempt {attempt} is already sealed")]
pub struct PhaseRunSealed {
    pub phase: String,
    pub attempt: u32,
}

/// One execution of a phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseRun {
    pub phase: String,
    pub phase_index: usize,
    /// 0-based, increasing every time this phase runs again within the run
    pub attempt: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub outcomes: Vec<TaskOutcome>,
    pub score: Option<QualityScore>,
    pub verdict: Option<Verdict>,
    pub reason: Option<String>,
    pub conflicts: Vec<ConflictRecord>,
}

impl PhaseRun {
    pub fn new(phase: impl Into<String>, phase_index: usize, attempt: u32) -> Self {
        Self {
            phase: phase.into(),
            phase_index,
            attempt,
            started_at: Utc::now(),
            finished_at: None,
            outcomes: Vec::new(),
            score: None,
            verdict: None,
            reason: None,
            conflicts: Vec::new(),
        }
    }

    pub fn is_sealed(&self) -> bool {
        self.verdict.is_some()
    }

    fn ensure_open(&self) -> Result<(), PhaseRunSealed> {
        if self.is_sealed() {
            return Err(PhaseRunSealed {
                phase: self.phase.clone(),
                attempt: self.attempt,
            });
        }
        Ok(())
    }

    /// Store the dispatcher output
    pub fn record_results(&mut self, outcomes: Vec<TaskOutcome>) -> Result<(), PhaseRunSealed> {
        self.ensure_open()?;
        self.outcomes = outcomes;
        Ok(())
    }

    /// Set the verdict. A sealed phase run can no longer change.
    pub fn seal(
        &mut self,
        evaluation: &GateEvaluation,
        conflicts: Vec<ConflictRecord>,
    ) -> Result<(), PhaseRunSealed> {
        self.ensure_open()?;
        self.score = Some(evaluation.score.clone());
        self.verdict = Some(evaluation.verdict);
        self.reason = Some(evaluation.reason.clone());
        self.conflicts = conflicts;
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    pub fn results(&self) -> impl Iterator<Item = &WorkerResult> {
        self.outcomes.iter().map(|o| &o.result)
    }

    pub fn passed(&self) -> bool {
        self.verdict.is_some_and(|v| v.is_pass())
    }

    /// Payloads of successful results, in task order
    pub fn output(&self) -> Value {
        Value::Array(
            self.results()
                .filter(|r| r.is_success())
                .map(|r| r.payload.clone())
                .collect(),
        )
    }
}

/// Snapshot answered by status queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStatusView {
    pub run_id: RunId,
    pub state: RunState,
    pub phase: Option<String>,
    pub attempt: Option<u32>,
    pub verdict: Option<Verdict>,
    pub last_score: Option<f64>,
}

/// Everything a finished run leaves behind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub project_id: String,
    pub workflow: String,
    pub state: RunState,
    pub phase_runs: Vec<PhaseRun>,
    pub iterations: Vec<IterationRecord>,
    pub audit: AuditLog,
    #[serde(default)]
    pub metrics: RunMetrics,
}

impl RunReport {
    pub fn outcome(&self) -> Option<RunOutcome> {
        self.state.outcome()
    }

    pub fn exit_code(&self) -> i32 {
        self.outcome().map(|o| o.exit_code()).unwrap_or(1)
    }

    /// Phase runs of one phase, in attempt order
    pub fn runs_of<'a>(&'a self, phase: &'a str) -> impl Iterator<Item = &'a PhaseRun> + 'a {
        self.phase_runs.iter().filter(move |r| r.phase == phase)
    }
}

/// One execution of a workflow definition
#[derive(Debug, Clone)]
pub struct WorkflowRun {
    run_id: RunId,
    project_id: String,
    definition: Arc<WorkflowDefinition>,
    state: RunState,
    phase_runs: Vec<PhaseRun>,
    iterations: Vec<IterationRecord>,
    iteration_counts: IterationCounts,
    audit: AuditLog,
}

impl WorkflowRun {
    pub fn new(
        run_id: RunId,
        project_id: impl Into<String>,
        definition: Arc<WorkflowDefinition>,
    ) -> Self {
        Self {
            run_id,
            project_id: project_id.into(),
            definition,
            state: RunState::Pending,
            phase_runs: Vec::new(),
            iterations: Vec::new(),
            iteration_counts: IterationCounts::new(),
            audit: AuditLog::new(run_id),
        }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn definition(&self) -> &Arc<WorkflowDefinition> {
        &self.definition
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn phase_runs(&self) -> &[PhaseRun] {
        &self.phase_runs
    }

    pub fn iterations(&self) -> &[IterationRecord] {
        &self.iterations
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub fn audit_mut(&mut self) -> &mut AuditLog {
        &mut self.audit
    }

    /// Attempt index the next run of `phase` will get
    pub fn next_attempt(&self, phase: &str) -> u32 {
        self.phase_runs.iter().filter(|r| r.phase == phase).count() as u32
    }

    /// Start a new phase run and move the run into `Running`
    pub fn begin_phase(&mut self, phase_index: usize) -> &mut PhaseRun {
        let name = self.definition.phases[phase_index].name.clone();
        let attempt = self.next_attempt(&name);
        self.state = RunState::Running {
            phase_index,
            attempt,
        };
        self.phase_runs.push(PhaseRun::new(name, phase_index, attempt));
        let last = self.phase_runs.len() - 1;
        &mut self.phase_runs[last]
    }

    pub fn current_phase_run(&self) -> Option<&PhaseRun> {
        self.phase_runs.last()
    }

    pub fn current_phase_run_mut(&mut self) -> Option<&mut PhaseRun> {
        self.phase_runs.last_mut()
    }

    /// Record a re-entry and charge it to the failing phase and the target
    pub fn record_iteration(&mut self, record: IterationRecord) {
        *self
            .iteration_counts
            .entry(record.from_phase.clone())
            .or_insert(0) += 1;
        if record.is_backtrack() {
            *self
                .iteration_counts
                .entry(record.to_phase.clone())
                .or_insert(0) += 1;
        }
        self.iterations.push(record);
    }

    /// Clear the iterations charged to `phase` once it passes
    pub fn reset_iterations(&mut self, phase: &str) {
        self.iteration_counts.remove(phase);
    }

    /// Iterations charged to each phase since it last passed
    pub fn iteration_counts(&self) -> &IterationCounts {
        &self.iteration_counts
    }

    /// Outputs of the latest passed run of every phase before `phase_index`
    pub fn memory_before(&self, phase_index: usize) -> BTreeMap<String, Value> {
        let mut memory = BTreeMap::new();
        for phase_run in &self.phase_runs {
            if phase_run.phase_index < phase_index && phase_run.passed() {
                memory.insert(phase_run.phase.clone(), phase_run.output());
            }
        }
        memory
    }

    pub fn complete(&mut self) {
        self.state = RunState::Completed;
    }

    pub fn abort(&mut self, outcome: RunOutcome, reason: impl Into<String>) {
        self.state = RunState::Aborted {
            outcome,
            reason: reason.into(),
        };
    }

    pub fn status_view(&self) -> RunStatusView {
        let current = self.current_phase_run();
        RunStatusView {
            run_id: self.run_id,
            state: self.state.clone(),
            phase: current.map(|r| r.phase.clone()),
            attempt: current.map(|r| r.attempt),
            verdict: self
                .phase_runs
                .iter()
                .rev()
                .find_map(|r| r.verdict),
            last_score: self
                .phase_runs
                .iter()
                .rev()
                .find_map(|r| r.score.as_ref().map(|s| s.aggregate())),
        }
    }

    pub fn into_report(self) -> RunReport {
        RunReport {
            metrics: RunMetrics::from_phase_runs(&self.phase_runs),
            run_id: self.run_id,
            project_id: self.project_id,
            workflow: self.definition.name.clone(),
            state: self.state,
            phase_runs: self.phase_runs,
            iterations: self.iterations,
            audit: self.audit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ids::TaskId;
    use crate::quality::CriterionScore;
    use crate::routing::IterationContext;
    use crate::task::{TaskContext, WorkerOutput};
    use crate::workflow::definition::{PhaseSpec, RubricCriterion};
    use serde_json::json;

    fn definition() -> Arc<WorkflowDefinition> {
        Arc::new(
            WorkflowDefinition::new("brand")
                .with_phase(
                    PhaseSpec::new("discovery")
                        .with_capability("research")
                        .with_criterion(RubricCriterion::new("insight", 1.0)),
                )
                .with_phase(
                    PhaseSpec::new("visual")
                        .with_capability("design")
                        .with_criterion(RubricCriterion::new("polish", 1.0))
                        .with_max_iterations(2),
                ),
        )
    }

    fn evaluation(verdict: Verdict, score: f64) -> GateEvaluation {
        GateEvaluation {
            score: QualityScore::from_criteria(vec![CriterionScore {
                criterion: "q".to_string(),
                weight: 1.0,
                score,
                forced_zero: false,
            }]),
            verdict,
            failed_criteria: Vec::new(),
            reason: String::new(),
        }
    }

    fn outcome(run_id: RunId, payload: Value) -> TaskOutcome {
        let task = Task::new("research", 0, TaskContext::new(run_id, "p", "discovery"));
        let result = WorkerResult::success(
            TaskId::new("research", 0),
            "research",
            "w",
            WorkerOutput::new(payload, 1.0),
            1,
        );
        TaskOutcome { task, result }
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(RunOutcome::Completed.exit_code(), 0);
        assert_eq!(RunOutcome::QualityFailure.exit_code(), 1);
        assert_eq!(RunOutcome::IterationLimitExceeded.exit_code(), 2);
        assert_eq!(RunOutcome::InvalidDefinition.exit_code(), 3);
        assert_eq!(RunOutcome::UserCancelled.exit_code(), 4);
    }

    #[test]
    fn test_attempts_increase_per_phase() {
        let mut run = WorkflowRun::new(RunId::new(), "p", definition());
        assert_eq!(run.state(), &RunState::Pending);

        assert_eq!(run.begin_phase(0).attempt, 0);
        assert_eq!(run.begin_phase(1).attempt, 0);
        assert_eq!(run.begin_phase(0).attempt, 1);
        assert_eq!(run.begin_phase(1).attempt, 1);
        assert_eq!(
            run.state(),
            &RunState::Running {
                phase_index: 1,
                attempt: 1
            }
        );
    }

    #[test]
    fn test_seal_twice_is_rejected() {
        let mut run = WorkflowRun::new(RunId::new(), "p", definition());
        let phase_run = run.begin_phase(0);
        phase_run
            .seal(&evaluation(Verdict::Pass, 5.0), Vec::new())
            .unwrap();
        let err = phase_run
            .seal(&evaluation(Verdict::Fail, 0.0), Vec::new())
            .unwrap_err();
        assert_eq!(err.attempt, 0);
        assert_eq!(phase_run.verdict, Some(Verdict::Pass));
        assert!(phase_run.record_results(Vec::new()).is_err());
        assert!(phase_run.finished_at.is_some());
    }

    #[test]
    fn test_memory_holds_passed_earlier_phases_only() {
        let mut run = WorkflowRun::new(RunId::new(), "p", definition());
        let run_id = run.run_id();

        let discovery = run.begin_phase(0);
        discovery
            .record_results(vec![outcome(run_id, json!({"persona": "maker"}))])
            .unwrap();
        discovery
            .seal(&evaluation(Verdict::Pass, 4.0), Vec::new())
            .unwrap();

        let memory = run.memory_before(1);
        assert_eq!(memory.get("discovery"), Some(&json!([{"persona": "maker"}])));
        assert!(run.memory_before(0).is_empty());
    }

    fn context(source: &str, target: &str) -> IterationContext {
        IterationContext {
            source_phase: source.to_string(),
            source_attempt: 0,
            target_phase: target.to_string(),
            failed_criteria: vec!["polish".to_string()],
            resolved_conflicts: Vec::new(),
            unresolved_subjects: Vec::new(),
            prior_score: QualityScore::from_criteria(Vec::new()),
            reason: String::new(),
        }
    }

    fn record(from: &str, to: &str, iteration: u32) -> IterationRecord {
        IterationRecord {
            from_phase: from.to_string(),
            from_attempt: iteration - 1,
            to_phase: to.to_string(),
            iteration,
            context: context(from, to),
        }
    }

    #[test]
    fn test_iteration_counts_follow_records() {
        let mut run = WorkflowRun::new(RunId::new(), "p", definition());
        for iteration in 1..=2 {
            run.record_iteration(record("visual", "visual", iteration));
        }
        assert_eq!(run.iteration_counts().get("visual"), Some(&2));
        assert_eq!(run.iteration_counts().get("discovery"), None);
    }

    #[test]
    fn test_backtrack_charges_both_phases_until_each_passes() {
        let mut run = WorkflowRun::new(RunId::new(), "p", definition());
        run.record_iteration(record("visual", "discovery", 1));
        assert_eq!(run.iteration_counts().get("visual"), Some(&1));
        assert_eq!(run.iteration_counts().get("discovery"), Some(&1));

        run.reset_iterations("discovery");
        assert_eq!(run.iteration_counts().get("discovery"), None);
        assert_eq!(run.iteration_counts().get("visual"), Some(&1));
        assert_eq!(run.iterations().len(), 1);
    }

    #[test]
    fn test_status_and_report() {
        let mut run = WorkflowRun::new(RunId::new(), "p", definition());
        run.begin_phase(0)
            .seal(&evaluation(Verdict::Iterate, 2.5), Vec::new())
            .unwrap();
        run.abort(RunOutcome::IterationLimitExceeded, "discovery exhausted");

        let status = run.status_view();
        assert_eq!(status.phase.as_deref(), Some("discovery"));
        assert_eq!(status.verdict, Some(Verdict::Iterate));
        assert_eq!(status.last_score, Some(2.5));

        let report = run.into_report();
        assert_eq!(report.outcome(), Some(RunOutcome::IterationLimitExceeded));
        assert_eq!(report.exit_code(), 2);
        assert_eq!(report.runs_of("discovery").count(), 1);
        assert_eq!(report.metrics.phase_runs, 1);
        assert_eq!(report.metrics.phase("discovery").map(|p| p.iterate_verdicts), Some(1));
    }
}
