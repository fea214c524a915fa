//! Run workflow use case
//!
//! Drives one [`WorkflowRun`] through its phases:
//!
//! ```text
//! Pending
//!    ↓ validate definition ──errors──► Aborted(InvalidDefinition)
//! Running(phase, attempt)
//!    ↓ dispatch → resolve conflicts → gate
//!    ├─ Pass    → next phase (or Completed after the last one)
//!    ├─ Iterate → router → Running(target, next attempt)
//!    │              └─ budget exhausted → Aborted(IterationLimitExceeded)
//!    └─ Fail    → Aborted(QualityFailure)
//! ```
//!
//! Cancellation is checked between phase transitions and after every
//! dispatch. Every decision point appends exactly one audit entry, and every
//! audit entry is also handed to the [`RunRecorder`].

use crate::config::RunSettings;
use crate::ports::manual_decision::{DeferDecision, ManualDecisionPort};
use crate::ports::progress::ProgressNotifier;
use crate::ports::run_recorder::{NoRunRecorder, RunEvent, RunRecorder};
use crate::registry::WorkerRegistry;
use crate::use_cases::dispatch_phase::PhaseDispatcher;
use phasegate_domain::core::string::truncate;
use phasegate_domain::quality::MAX_SCORE;
use phasegate_domain::{
    ConfidenceScorer, ConflictRecord, ConflictResolver, CriterionScorer, DecisionKind,
    FeedbackItem, FeedbackRouter, IterationContext, IterationRecord, OrchestrationError,
    QualityGate, RunId, RunOutcome, RunReport, RunStatusView, TaskContext, Verdict,
    WorkerResult, WorkflowDefinition, WorkflowRun, has_errors,
};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Out-of-band feedback for one phase
pub type FeedbackSubmission = (String, Vec<FeedbackItem>);

/// Input for the RunWorkflow use case
pub struct RunWorkflowInput {
    pub run_id: RunId,
    pub project_id: String,
    pub definition: Arc<WorkflowDefinition>,
    pub cancellation: CancellationToken,
    /// Feedback submitted while the run is in progress
    pub feedback: Option<mpsc::UnboundedReceiver<FeedbackSubmission>>,
    /// Receives a fresh status snapshot after every state change
    pub status: Option<watch::Sender<RunStatusView>>,
}

impl RunWorkflowInput {
    pub fn new(project_id: impl Into<String>, definition: Arc<WorkflowDefinition>) -> Self {
        Self {
            run_id: RunId::new(),
            project_id: project_id.into(),
            definition,
            cancellation: CancellationToken::new(),
            feedback: None,
            status: None,
        }
    }

    pub fn with_run_id(mut self, run_id: RunId) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn with_feedback(mut self, feedback: mpsc::UnboundedReceiver<FeedbackSubmission>) -> Self {
        self.feedback = Some(feedback);
        self
    }

    pub fn with_status(mut self, status: watch::Sender<RunStatusView>) -> Self {
        self.status = Some(status);
        self
    }
}

/// Use case for running a workflow definition to completion
pub struct RunWorkflowUseCase {
    registry: Arc<WorkerRegistry>,
    dispatcher: PhaseDispatcher,
    gate: QualityGate,
    resolver: ConflictResolver,
    router: FeedbackRouter,
    scorer: Arc<dyn CriterionScorer>,
    decisions: Arc<dyn ManualDecisionPort>,
    recorder: Arc<dyn RunRecorder>,
}

impl RunWorkflowUseCase {
    pub fn new(registry: Arc<WorkerRegistry>, settings: RunSettings) -> Self {
        Self {
            dispatcher: PhaseDispatcher::new(Arc::clone(&registry), settings.dispatch().clone()),
            registry,
            gate: QualityGate::new(*settings.gate()),
            resolver: ConflictResolver::new(settings.resolver().clone()),
            router: FeedbackRouter,
            scorer: Arc::new(ConfidenceScorer),
            decisions: Arc::new(DeferDecision),
            recorder: Arc::new(NoRunRecorder),
        }
    }

    pub fn with_scorer(mut self, scorer: Arc<dyn CriterionScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn with_manual_decisions(mut self, decisions: Arc<dyn ManualDecisionPort>) -> Self {
        self.decisions = decisions;
        self
    }

    pub fn with_recorder(mut self, recorder: Arc<dyn RunRecorder>) -> Self {
        self.recorder = recorder;
        self
    }

    pub fn registry(&self) -> &Arc<WorkerRegistry> {
        &self.registry
    }

    /// Execute the run. Always returns a report; the outcome is in its state.
    pub async fn execute(
        &self,
        input: RunWorkflowInput,
        progress: &dyn ProgressNotifier,
    ) -> RunReport {
        let RunWorkflowInput {
            run_id,
            project_id,
            definition,
            cancellation,
            mut feedback,
            status,
        } = input;

        let mut run = WorkflowRun::new(run_id, project_id, Arc::clone(&definition));
        let publish = |run: &WorkflowRun| {
            if let Some(status) = &status {
                status.send_replace(run.status_view());
            }
        };

        info!(
            "Starting run {} of workflow '{}' ({} phases)",
            run_id,
            definition.name,
            definition.len()
        );
        self.recorder.record(RunEvent::new(
            "run_started",
            json!({
                "run_id": run_id,
                "project_id": run.project_id(),
                "workflow": definition.name,
                "definition": definition.as_ref(),
            }),
        ));
        let phase_names: Vec<&str> = definition.phases.iter().map(|p| p.name.as_str()).collect();
        self.audit(
            &mut run,
            None,
            DecisionKind::RunStarted,
            definition.as_ref(),
            format!("workflow '{}': {}", definition.name, phase_names.join(" → ")),
            None,
        );

        let issues = definition.validate_against(|capability| self.registry.contains(capability));
        for issue in issues.iter().filter(|i| !i.is_error()) {
            warn!("Definition warning: {}", issue);
        }
        if has_errors(&issues) {
            let err = OrchestrationError::InvalidDefinition(
                issues.into_iter().filter(|i| i.is_error()).collect(),
            );
            warn!("{}", err);
            return self.abort(&mut run, RunOutcome::InvalidDefinition, &err, progress, &publish);
        }

        progress.on_run_start(run_id, &definition.name, definition.len());

        let mut pending_iterations: BTreeMap<String, IterationContext> = BTreeMap::new();
        let mut inbox: BTreeMap<String, Vec<FeedbackItem>> = BTreeMap::new();
        let mut phase_index = 0;

        while phase_index < definition.len() {
            if cancellation.is_cancelled() {
                return self.abort(
                    &mut run,
                    RunOutcome::UserCancelled,
                    &OrchestrationError::UserCancelled,
                    progress,
                    &publish,
                );
            }

            let spec = &definition.phases[phase_index];
            let memory = run.memory_before(phase_index);
            let attempt = run.begin_phase(phase_index).attempt;
            publish(&run);

            let context = TaskContext::new(run_id, run.project_id(), &spec.name)
                .with_attempt(attempt)
                .with_iteration(pending_iterations.get(&spec.name).cloned())
                .with_memory(memory);
            self.audit(
                &mut run,
                Some(&spec.name),
                DecisionKind::DispatchStarted,
                &json!({
                    "attempt": attempt,
                    "capabilities": spec.capabilities,
                    "fan_out": spec.fan_out,
                    "concurrent": spec.concurrent,
                    "iteration": context.iteration,
                }),
                format!(
                    "attempt {} of '{}': {} capability(ies) × {} variant(s), {}",
                    attempt,
                    spec.name,
                    spec.capabilities.len(),
                    spec.fan_out,
                    if spec.concurrent {
                        "concurrent"
                    } else {
                        "sequential"
                    }
                ),
                None,
            );

            let outcomes = self
                .dispatcher
                .dispatch(spec, context, &cancellation, progress)
                .await;
            let results: Vec<WorkerResult> = outcomes.iter().map(|o| o.result.clone()).collect();
            if let Some(phase_run) = run.current_phase_run_mut()
                && let Err(e) = phase_run.record_results(outcomes)
            {
                warn!("{}", e);
            }

            let failed = results.iter().filter(|r| !r.is_success()).count();
            self.audit(
                &mut run,
                Some(&spec.name),
                DecisionKind::DispatchCompleted,
                &results,
                format!(
                    "{} of {} task(s) succeeded{}",
                    results.len() - failed,
                    results.len(),
                    describe_failures(&results)
                ),
                None,
            );

            if cancellation.is_cancelled() {
                return self.abort(
                    &mut run,
                    RunOutcome::UserCancelled,
                    &OrchestrationError::UserCancelled,
                    progress,
                    &publish,
                );
            }

            // Feedback: worker items plus anything submitted for this phase
            if let Some(receiver) = feedback.as_mut() {
                while let Ok((phase, items)) = receiver.try_recv() {
                    inbox.entry(phase).or_default().extend(items);
                }
            }
            let mut items: Vec<FeedbackItem> =
                results.iter().flat_map(|r| r.feedback.clone()).collect();
            items.extend(inbox.remove(&spec.name).unwrap_or_default());

            let mut conflicts = self.resolver.resolve(&items);
            for conflict in conflicts.iter_mut() {
                self.settle_conflict(&mut run, &spec.name, conflict).await;
            }

            let mut evaluation = self.gate.evaluate(&spec.rubric, &results, self.scorer.as_ref());
            let open: Vec<&str> = conflicts
                .iter()
                .filter(|c| !c.is_resolved())
                .map(|c| c.subject.as_str())
                .collect();
            if !open.is_empty() {
                evaluation.hold(format!(
                    "{}; awaiting manual decision on {}",
                    evaluation.reason,
                    open.join(", ")
                ));
            }

            self.audit(
                &mut run,
                Some(&spec.name),
                DecisionKind::Verdict,
                &evaluation.score,
                format!(
                    "{}: {} ({})",
                    evaluation.verdict,
                    evaluation.score.summary(),
                    evaluation.reason
                ),
                Some(evaluation.score.aggregate() / MAX_SCORE),
            );
            if let Some(phase_run) = run.current_phase_run_mut() {
                if let Err(e) = phase_run.seal(&evaluation, conflicts.clone()) {
                    warn!("{}", e);
                }
                match serde_json::to_value(&*phase_run) {
                    Ok(payload) => self.recorder.record(RunEvent::new("phase_run", payload)),
                    Err(e) => warn!("Failed to serialize phase run: {}", e),
                }
            }
            progress.on_phase_complete(&spec.name, &evaluation);
            publish(&run);

            match evaluation.verdict {
                Verdict::Pass => {
                    pending_iterations.remove(&spec.name);
                    run.reset_iterations(&spec.name);
                    let next = definition
                        .phases
                        .get(phase_index + 1)
                        .map(|p| p.name.as_str());
                    self.audit(
                        &mut run,
                        Some(&spec.name),
                        DecisionKind::PhaseAdvanced,
                        &json!({"from": spec.name, "to": next}),
                        match next {
                            Some(next) => format!("'{}' passed; advancing to '{}'", spec.name, next),
                            None => format!("'{}' passed; no phases left", spec.name),
                        },
                        None,
                    );
                    phase_index += 1;
                }
                Verdict::Fail => {
                    let err = OrchestrationError::GateFailure(spec.name.clone());
                    info!("{}: {}", err, evaluation.reason);
                    return self.abort(
                        &mut run,
                        RunOutcome::QualityFailure,
                        &format!("{}: {}", err, evaluation.reason),
                        progress,
                        &publish,
                    );
                }
                Verdict::Iterate => {
                    let counts = run.iteration_counts().clone();
                    match self.router.route(
                        &definition,
                        phase_index,
                        attempt,
                        &evaluation,
                        &conflicts,
                        &counts,
                    ) {
                        Ok(decision) => {
                            let target = &definition.phases[decision.target_index];
                            self.audit(
                                &mut run,
                                Some(&spec.name),
                                DecisionKind::Routed,
                                &decision.context,
                                format!(
                                    "re-entering '{}' (iteration {}/{}): {}",
                                    decision.target_phase,
                                    decision.iteration,
                                    target.max_iterations,
                                    truncate(&evaluation.reason, 200)
                                ),
                                None,
                            );
                            let record = IterationRecord::from_decision(&decision);
                            progress.on_iteration(&record);
                            run.record_iteration(record);
                            // the failing phase keeps its context until it passes
                            if decision.target_index != phase_index {
                                pending_iterations
                                    .insert(spec.name.clone(), decision.context.clone());
                            }
                            pending_iterations
                                .insert(decision.target_phase.clone(), decision.context);
                            phase_index = decision.target_index;
                        }
                        Err(err) => {
                            let outcome = match err {
                                OrchestrationError::IterationLimitExceeded { .. } => {
                                    RunOutcome::IterationLimitExceeded
                                }
                                _ => RunOutcome::QualityFailure,
                            };
                            info!("{}", err);
                            return self.abort(&mut run, outcome, &err, progress, &publish);
                        }
                    }
                }
            }
        }

        let phase_runs = run.phase_runs().len();
        let iterations = run.iterations().len();
        self.audit(
            &mut run,
            None,
            DecisionKind::RunCompleted,
            &json!({"phase_runs": phase_runs, "iterations": iterations}),
            format!(
                "all {} phase(s) passed after {} phase run(s)",
                definition.len(),
                phase_runs
            ),
            None,
        );
        run.complete();
        info!("Run {} completed", run_id);
        self.finish(run, progress, &publish)
    }

    /// Record an unresolved conflict's manual decision, or its escalation
    async fn settle_conflict(
        &self,
        run: &mut WorkflowRun,
        phase: &str,
        conflict: &mut ConflictRecord,
    ) {
        if let Some(resolution) = conflict.outcome.resolution().cloned() {
            debug!("Conflict on '{}' resolved: {}", conflict.subject, resolution.action);
            self.audit(
                run,
                Some(phase),
                DecisionKind::ConflictResolved,
                &conflict.items,
                resolution.rationale,
                Some(resolution.confidence),
            );
            return;
        }

        match self.decisions.decide(run.run_id(), phase, conflict).await {
            Ok(Some(decision)) => {
                conflict.settle(decision.action, decision.note);
                if let Some(resolution) = conflict.outcome.resolution().cloned() {
                    self.audit(
                        run,
                        Some(phase),
                        DecisionKind::ConflictResolved,
                        &conflict.items,
                        resolution.rationale,
                        Some(resolution.confidence),
                    );
                }
            }
            Ok(None) => {
                let reason = match conflict.require_resolution() {
                    Err(err) => err.to_string(),
                    Ok(_) => String::new(),
                };
                self.audit(
                    run,
                    Some(phase),
                    DecisionKind::ConflictEscalated,
                    &conflict.items,
                    reason,
                    None,
                );
            }
            Err(e) => {
                warn!("Manual decision for '{}' failed: {}", conflict.subject, e);
                self.audit(
                    run,
                    Some(phase),
                    DecisionKind::ConflictEscalated,
                    &conflict.items,
                    format!("manual decision failed: {}", e),
                    None,
                );
            }
        }
    }

    fn audit<T: Serialize + ?Sized>(
        &self,
        run: &mut WorkflowRun,
        phase: Option<&str>,
        kind: DecisionKind,
        inputs: &T,
        rationale: impl Into<String>,
        confidence: Option<f64>,
    ) {
        let seq = run
            .audit_mut()
            .append(phase, kind, inputs, rationale, confidence);
        if let Some(entry) = run.audit().get(seq) {
            debug!("audit #{} {}: {}", entry.seq, entry.kind, entry.rationale);
            match serde_json::to_value(entry) {
                Ok(payload) => self.recorder.record(RunEvent::new("audit", payload)),
                Err(e) => warn!("Failed to serialize audit entry: {}", e),
            }
        }
    }

    fn abort(
        &self,
        run: &mut WorkflowRun,
        outcome: RunOutcome,
        reason: &dyn std::fmt::Display,
        progress: &dyn ProgressNotifier,
        publish: &dyn Fn(&WorkflowRun),
    ) -> RunReport {
        let reason = reason.to_string();
        let phase = run.current_phase_run().map(|r| r.phase.clone());
        self.audit(
            run,
            phase.as_deref(),
            DecisionKind::RunAborted,
            &json!({"outcome": outcome, "reason": reason}),
            format!("{}: {}", outcome, reason),
            None,
        );
        run.abort(outcome, reason);
        info!("Run {} aborted ({})", run.run_id(), outcome);
        self.finish(run.clone(), progress, publish)
    }

    fn finish(
        &self,
        run: WorkflowRun,
        progress: &dyn ProgressNotifier,
        publish: &dyn Fn(&WorkflowRun),
    ) -> RunReport {
        publish(&run);
        progress.on_run_complete(run.state());
        let report = run.into_report();
        self.recorder.record(RunEvent::new(
            "run_finished",
            json!({
                "run_id": report.run_id,
                "state": report.state,
                "exit_code": report.exit_code(),
                "phase_runs": report.phase_runs.len(),
                "audit_entries": report.audit.len(),
                "metrics": report.metrics,
            }),
        ));
        report
    }
}

fn describe_failures(results: &[WorkerResult]) -> String {
    let failures: Vec<String> = results
        .iter()
        .filter_map(|r| r.error.as_ref().map(|e| format!("{} {}", r.task_id, e)))
        .collect();
    if failures.is_empty() {
        String::new()
    } else {
        format!("; {}", failures.join(", "))
    }
}
