//! Task entities

use crate::core::ids::{RunId, TaskId};
use crate::routing::IterationContext;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Context snapshot handed to a worker along with its task
///
/// Scoped to one (run, phase) pair. Everything a worker may know about the
/// surrounding run travels through here; there is no ambient store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskContext {
    pub run_id: RunId,
    pub project_id: String,
    pub phase: String,
    /// Attempt index of the phase run this task belongs to (0-based)
    pub attempt: u32,
    /// What failed last time, when this attempt is a re-entry
    pub iteration: Option<IterationContext>,
    /// Output of the preceding task in a sequential phase
    pub previous_output: Option<Value>,
    /// Outputs of earlier passed phases, keyed by phase name
    pub memory: BTreeMap<String, Value>,
}

impl TaskContext {
    pub fn new(run_id: RunId, project_id: impl Into<String>, phase: impl Into<String>) -> Self {
        Self {
            run_id,
            project_id: project_id.into(),
            phase: phase.into(),
            attempt: 0,
            iteration: None,
            previous_output: None,
            memory: BTreeMap::new(),
        }
    }

    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }

    pub fn with_iteration(mut self, iteration: Option<IterationContext>) -> Self {
        self.iteration = iteration;
        self
    }

    pub fn with_memory(mut self, memory: BTreeMap<String, Value>) -> Self {
        self.memory = memory;
        self
    }

    /// Whether this context belongs to a re-entered phase
    pub fn is_retry(&self) -> bool {
        self.iteration.is_some()
    }
}

/// A unit of work for one worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub capability: String,
    /// Variant seed, distinct per task of the same capability (fan-out)
    pub variant: u32,
    pub payload: Value,
    pub context: TaskContext,
}

impl Task {
    pub fn new(capability: impl Into<String>, variant: u32, context: TaskContext) -> Self {
        let capability = capability.into();
        Self {
            id: TaskId::new(&capability, variant),
            capability,
            variant,
            payload: Value::Null,
            context,
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Same task, carrying the output of the task that ran before it
    pub fn chained_after(mut self, previous_output: Option<Value>) -> Self {
        self.context.previous_output = previous_output;
        self
    }
}
