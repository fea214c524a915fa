//! Worker results

use crate::core::error::OrchestrationError;
use crate::core::ids::TaskId;
use crate::feedback::FeedbackItem;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Why a task produced no usable output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum WorkerError {
    /// The task exceeded its timeout on every allowed attempt
    Timeout,
    /// The worker reported an explicit failure
    Failure(String),
    /// The task was cancelled (fail-fast sibling failure or run cancellation)
    Cancelled,
}

impl WorkerError {
    pub fn failure(reason: impl Into<String>) -> Self {
        WorkerError::Failure(reason.into())
    }

    /// Whether the dispatcher may retry after this error
    pub fn is_timeout(&self) -> bool {
        matches!(self, WorkerError::Timeout)
    }
}

impl std::fmt::Display for WorkerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerError::Timeout => write!(f, "WorkerTimeout"),
            WorkerError::Failure(reason) => write!(f, "WorkerFailure: {}", reason),
            WorkerError::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl std::error::Error for WorkerError {}

impl From<WorkerError> for OrchestrationError {
    fn from(err: WorkerError) -> Self {
        match err {
            WorkerError::Timeout => OrchestrationError::WorkerTimeout,
            WorkerError::Failure(reason) => OrchestrationError::WorkerFailure(reason),
            WorkerError::Cancelled => OrchestrationError::UserCancelled,
        }
    }
}

/// What a worker returns on success
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkerOutput {
    #[serde(default)]
    pub payload: Value,
    pub confidence: f64,
    #[serde(default)]
    pub feedback: Vec<FeedbackItem>,
}

impl WorkerOutput {
    pub fn new(payload: Value, confidence: f64) -> Self {
        Self {
            payload,
            confidence,
            feedback: Vec::new(),
        }
    }

    pub fn with_feedback(mut self, item: FeedbackItem) -> Self {
        self.feedback.push(item);
        self
    }
}

/// Outcome of one dispatched task. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerResult {
    pub task_id: TaskId,
    pub capability: String,
    /// Name of the worker that handled the task (empty if none ran)
    pub worker: String,
    pub payload: Value,
    /// Confidence in [0, 1]; always 0 for errored results
    pub confidence: f64,
    pub error: Option<WorkerError>,
    pub feedback: Vec<FeedbackItem>,
    /// Number of attempts spent on the task, retries included
    pub attempts: u32,
}

impl WorkerResult {
    pub fn success(
        task_id: TaskId,
        capability: impl Into<String>,
        worker: impl Into<String>,
        output: WorkerOutput,
        attempts: u32,
    ) -> Self {
        let confidence = if output.confidence.is_finite() {
            output.confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            task_id,
            capability: capability.into(),
            worker: worker.into(),
            payload: output.payload,
            confidence,
            error: None,
            feedback: output.feedback,
            attempts,
        }
    }

    /// Placeholder result for a task that produced no output
    pub fn failed(
        task_id: TaskId,
        capability: impl Into<String>,
        worker: impl Into<String>,
        error: WorkerError,
        attempts: u32,
    ) -> Self {
        Self {
            task_id,
            capability: capability.into(),
            worker: worker.into(),
            payload: Value::Null,
            confidence: 0.0,
            error: Some(error),
            feedback: Vec::new(),
            attempts,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}
