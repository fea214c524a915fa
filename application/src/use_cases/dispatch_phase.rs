//! Dispatch phase use case
//!
//! Turns a [`PhaseSpec`] into tasks, hands them to workers from the
//! [`WorkerRegistry`] and collects one [`WorkerResult`] per task.
//!
//! # Cancellation
//!
//! Two tokens are involved:
//!
//! - the **run token** (owned by the orchestrator): once cancelled, no new
//!   attempt starts, and in-flight attempts get `cancel_grace` to finish
//! - the **phase token** (created per dispatch, not a child of the run
//!   token): cancelled after the grace period, or by fail-fast; in-flight attempts stop immediately and yield
//!   `WorkerError::Cancelled`

use crate::config::DispatchParams;
use crate::ports::progress::ProgressNotifier;
use crate::ports::worker::Worker;
use crate::registry::WorkerRegistry;
use phasegate_domain::{PhaseSpec, Task, TaskContext, TaskOutcome, WorkerError, WorkerResult};
use serde_json::{Value, json};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Runs the tasks of one phase attempt
pub struct PhaseDispatcher {
    registry: Arc<WorkerRegistry>,
    params: DispatchParams,
}

impl PhaseDispatcher {
    pub fn new(registry: Arc<WorkerRegistry>, params: DispatchParams) -> Self {
        Self { registry, params }
    }

    pub fn params(&self) -> &DispatchParams {
        &self.params
    }

    /// Tasks for one attempt: `fan_out` variants per capability, in
    /// declaration order
    pub fn plan(&self, phase: &PhaseSpec, context: &TaskContext) -> Vec<Task> {
        phase
            .capabilities
            .iter()
            .flat_map(|capability| {
                (0..phase.fan_out).map(move |variant| {
                    Task::new(capability.clone(), variant, context.clone()).with_payload(json!({
                        "phase": phase.name,
                        "capability": capability,
                        "variant": variant,
                    }))
                })
            })
            .collect()
    }

    /// Run every task of `phase` and return the outcomes in task order.
    ///
    /// Never fails: a task that produced no output is represented by a
    /// placeholder result carrying its [`WorkerError`].
    pub async fn dispatch(
        &self,
        phase: &PhaseSpec,
        context: TaskContext,
        run_token: &CancellationToken,
        progress: &dyn ProgressNotifier,
    ) -> Vec<TaskOutcome> {
        let tasks = self.plan(phase, &context);
        progress.on_phase_start(&phase.name, context.attempt, tasks.len());
        info!(
            "Dispatching {} task(s) for phase '{}' attempt {} ({})",
            tasks.len(),
            phase.name,
            context.attempt,
            if phase.concurrent {
                "concurrent"
            } else {
                "sequential"
            }
        );

        let phase_token = CancellationToken::new();
        if phase.concurrent {
            let results = self
                .run_concurrent(&phase.name, &tasks, run_token, &phase_token, progress)
                .await;
            tasks
                .into_iter()
                .zip(results)
                .map(|(task, result)| TaskOutcome { task, result })
                .collect()
        } else {
            self.run_sequential(&phase.name, tasks, run_token, &phase_token, progress)
                .await
        }
    }

    async fn run_concurrent(
        &self,
        phase: &str,
        tasks: &[Task],
        run_token: &CancellationToken,
        phase_token: &CancellationToken,
        progress: &dyn ProgressNotifier,
    ) -> Vec<WorkerResult> {
        let mut slots: Vec<Option<WorkerResult>> = vec![None; tasks.len()];
        let mut join_set = JoinSet::new();

        for (index, task) in tasks.iter().enumerate() {
            let Some(worker) = self.registry.select(&task.capability, task.variant) else {
                slots[index] = Some(unavailable(task));
                continue;
            };
            let attempt = TaskAttempt {
                worker,
                pool: self.registry.pool(&task.capability),
                task: task.clone(),
                params: self.params.clone(),
                run_token: run_token.clone(),
                phase_token: phase_token.clone(),
            };
            join_set.spawn(async move { (index, attempt.run().await) });
        }

        let mut grace_deadline: Option<Instant> = None;
        loop {
            let deadline = grace_deadline;
            let grace_timer = async move {
                match deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending::<()>().await,
                }
            };

            let joined = tokio::select! {
                biased;
                _ = run_token.cancelled(), if grace_deadline.is_none() => {
                    debug!("Run cancelled; giving in-flight tasks {:?}", self.params.cancel_grace);
                    grace_deadline = Some(Instant::now() + self.params.cancel_grace);
                    continue;
                }
                _ = grace_timer, if !phase_token.is_cancelled() => {
                    warn!("Grace period over; cancelling remaining tasks of phase '{}'", phase);
                    phase_token.cancel();
                    continue;
                }
                joined = join_set.join_next() => joined,
            };

            let Some(joined) = joined else {
                break;
            };

            match joined {
                Ok((index, result)) => {
                    progress.on_task_complete(phase, &result);
                    if self.should_stop_siblings(&result) && !phase_token.is_cancelled() {
                        info!(
                            "Task {} failed ({}); cancelling siblings",
                            result.task_id,
                            result.error.as_ref().map(|e| e.to_string()).unwrap_or_default()
                        );
                        phase_token.cancel();
                    }
                    slots[index] = Some(result);
                }
                Err(e) => {
                    warn!("Task join error: {}", e);
                }
            }
        }

        slots
            .into_iter()
            .zip(tasks)
            .map(|(slot, task)| {
                slot.unwrap_or_else(|| {
                    WorkerResult::failed(
                        task.id.clone(),
                        &task.capability,
                        "",
                        WorkerError::failure("task aborted before reporting a result"),
                        0,
                    )
                })
            })
            .collect()
    }

    async fn run_sequential(
        &self,
        phase: &str,
        tasks: Vec<Task>,
        run_token: &CancellationToken,
        phase_token: &CancellationToken,
        progress: &dyn ProgressNotifier,
    ) -> Vec<TaskOutcome> {
        let mut outcomes = Vec::with_capacity(tasks.len());
        let mut previous_output: Option<Value> = None;

        for task in tasks {
            let task = task.chained_after(previous_output.clone());

            let result = if phase_token.is_cancelled() || run_token.is_cancelled() {
                cancelled(&task, "", 0)
            } else if let Some(worker) = self.registry.select(&task.capability, task.variant) {
                let attempt = TaskAttempt {
                    worker,
                    pool: self.registry.pool(&task.capability),
                    task: task.clone(),
                    params: self.params.clone(),
                    run_token: run_token.clone(),
                    phase_token: phase_token.clone(),
                };
                with_grace(attempt.run(), run_token, phase_token, &self.params).await
            } else {
                unavailable(&task)
            };

            progress.on_task_complete(phase, &result);
            if self.should_stop_siblings(&result) {
                info!(
                    "Task {} failed; skipping the rest of phase '{}'",
                    result.task_id, phase
                );
                phase_token.cancel();
            }
            if result.is_success() {
                previous_output = Some(result.payload.clone());
            }
            outcomes.push(TaskOutcome { task, result });
        }

        outcomes
    }

    fn should_stop_siblings(&self, result: &WorkerResult) -> bool {
        self.params.fail_fast()
            && matches!(
                result.error,
                Some(WorkerError::Failure(_)) | Some(WorkerError::Timeout)
            )
    }
}

/// Await `future`; once the run is cancelled, allow it `cancel_grace` more
/// before cancelling the phase token.
async fn with_grace<F>(
    future: F,
    run_token: &CancellationToken,
    phase_token: &CancellationToken,
    params: &DispatchParams,
) -> WorkerResult
where
    F: Future<Output = WorkerResult>,
{
    tokio::pin!(future);
    tokio::select! {
        result = &mut future => result,
        _ = run_token.cancelled() => {
            match tokio::time::timeout(params.cancel_grace, &mut future).await {
                Ok(result) => result,
                Err(_) => {
                    phase_token.cancel();
                    future.await
                }
            }
        }
    }
}

/// One task bound to its worker, with retry state
struct TaskAttempt {
    worker: Arc<dyn Worker>,
    pool: Option<Arc<Semaphore>>,
    task: Task,
    params: DispatchParams,
    run_token: CancellationToken,
    phase_token: CancellationToken,
}

impl TaskAttempt {
    async fn run(self) -> WorkerResult {
        let _permit = match &self.pool {
            Some(pool) => {
                let pool = Arc::clone(pool);
                tokio::select! {
                    biased;
                    _ = self.phase_token.cancelled() => {
                        return cancelled(&self.task, self.worker.name(), 0);
                    }
                    permit = pool.acquire_owned() => permit.ok(),
                }
            }
            None => None,
        };

        let mut attempts = 0u32;
        let mut timeouts = 0u32;
        let mut failures = 0u32;

        loop {
            if self.run_token.is_cancelled() || self.phase_token.is_cancelled() {
                return cancelled(&self.task, self.worker.name(), attempts);
            }
            attempts += 1;

            let outcome = tokio::select! {
                biased;
                _ = self.phase_token.cancelled() => Err(WorkerError::Cancelled),
                outcome = tokio::time::timeout(
                    self.params.task_timeout,
                    self.worker.process(self.task.clone()),
                ) => outcome.unwrap_or(Err(WorkerError::Timeout)),
            };

            match outcome {
                Ok(output) => {
                    debug!(
                        "Task {} done by {} (attempt {})",
                        self.task.id,
                        self.worker.name(),
                        attempts
                    );
                    return WorkerResult::success(
                        self.task.id.clone(),
                        &self.task.capability,
                        self.worker.name(),
                        output,
                        attempts,
                    );
                }
                Err(WorkerError::Timeout) if timeouts < self.params.timeout_retries => {
                    timeouts += 1;
                    warn!(
                        "Task {} timed out after {:?}; retrying ({}/{})",
                        self.task.id, self.params.task_timeout, timeouts, self.params.timeout_retries
                    );
                }
                Err(WorkerError::Failure(reason)) if failures < self.params.failure_retries => {
                    failures += 1;
                    warn!(
                        "Task {} failed: {}; retrying ({}/{})",
                        self.task.id, reason, failures, self.params.failure_retries
                    );
                }
                Err(error) => {
                    warn!("Task {} gave up: {}", self.task.id, error);
                    return WorkerResult::failed(
                        self.task.id.clone(),
                        &self.task.capability,
                        self.worker.name(),
                        error,
                        attempts,
                    );
                }
            }
        }
    }
}

fn cancelled(task: &Task, worker: &str, attempts: u32) -> WorkerResult {
    WorkerResult::failed(
        task.id.clone(),
        &task.capability,
        worker,
        WorkerError::Cancelled,
        attempts,
    )
}

fn unavailable(task: &Task) -> WorkerResult {
    WorkerResult::failed(
        task.id.clone(),
        &task.capability,
        "",
        WorkerError::failure(format!("no worker for capability '{}'", task.capability)),
        0,
    )
}
